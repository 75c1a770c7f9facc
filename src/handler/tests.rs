use bytes::Bytes;
use serde_json::json;
use std::fs;
use std::time::Duration;
use tokio::io::{duplex, AsyncWriteExt, DuplexStream};
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;

use crate::client::{GameUpload, LobbyClient};
use crate::client_connection::ClientConnectionDescriptor;
use crate::lobby_errors::FailReason;
use crate::packet::{send_frame, FrameCodec};
use crate::request::{Response, Status};
use crate::rooms::MatchStatus;
use crate::session::run_session;
use crate::store::Role;
use crate::test_support::TestLobby;
use crate::transfer::tests::write_zip;

fn upload(name: &str, version: &str, max_players: u32) -> GameUpload {
    GameUpload {
        game_name: name.to_string(),
        version: version.to_string(),
        description: format!("{} for testing", name),
        max_players,
    }
}

async fn publish(
    lobby: &TestLobby,
    dev: &mut LobbyClient<DuplexStream>,
    meta: &GameUpload,
    update: bool,
) -> Response {
    let archive = lobby
        .path()
        .join(format!("{}-{}.zip", meta.game_name, meta.version));
    let client_script = format!("print('{} {}')", meta.game_name, meta.version);
    write_zip(
        &archive,
        &[
            ("client/run.py", client_script.as_bytes()),
            ("server/game_server.py", b"print('server')"),
        ],
    );
    dev.upload_game(meta, &archive, update).await.unwrap()
}

fn room_id(rsp: &Response) -> u64 {
    rsp.get("room_id").and_then(|id| id.as_u64()).unwrap()
}

#[tokio::test]
async fn register_login_and_single_session() {
    let lobby = TestLobby::new().await;

    let mut first = lobby.connect();
    assert!(first.register("alice", "pw", Role::Player).await.unwrap().is_success());
    let dup = first.register("alice", "other", Role::Player).await.unwrap();
    assert_eq!(dup.reason, Some(FailReason::AlreadyRegistered));

    let rsp = first.login("alice", "pw").await.unwrap();
    assert!(rsp.is_success());
    assert_eq!(rsp.get("user").unwrap()["username"], "alice");
    assert_eq!(rsp.get("user").unwrap()["role"], "player");

    let again = first.login("alice", "pw").await.unwrap();
    assert_eq!(again.reason, Some(FailReason::AlreadyLoggedIn));

    let mut second = lobby.connect();
    let rsp = second.login("alice", "wrong").await.unwrap();
    assert_eq!(rsp.reason, Some(FailReason::InvalidCredentials));
    let rsp = second.login("alice", "pw").await.unwrap();
    assert_eq!(rsp.reason, Some(FailReason::AlreadyLoggedIn));

    // The first session releases the name once it notices the closed stream
    drop(first);
    let mut admitted = false;
    for _ in 0..100 {
        if second.login("alice", "pw").await.unwrap().is_success() {
            admitted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(admitted);
}

#[tokio::test]
async fn logout_releases_the_name_immediately() {
    let lobby = TestLobby::new().await;
    let mut alice = lobby.user("alice", Role::Player).await;

    assert!(alice.logout().await.unwrap().is_success());
    let rsp = alice.request(json!({"action": "LIST_GAMES"})).await.unwrap();
    assert_eq!(rsp.reason, Some(FailReason::NotAuthenticated));

    let mut elsewhere = lobby.connect();
    assert!(elsewhere.login("alice", "pw").await.unwrap().is_success());
}

#[tokio::test]
async fn bad_requests_fail_without_closing_the_connection() {
    let lobby = TestLobby::new().await;
    let mut client = lobby.connect();

    let rsp = client.request(json!({"action": "FLY"})).await.unwrap();
    assert_eq!(rsp.status, Status::Fail);
    assert_eq!(rsp.reason, Some(FailReason::UnknownAction));

    let rsp = client
        .request(json!({"action": "LOGIN", "username": "bob"}))
        .await
        .unwrap();
    assert_eq!(rsp.reason, Some(FailReason::InvalidRequest));

    let rsp = client.request(json!({"action": "LIST_ROOMS"})).await.unwrap();
    assert_eq!(rsp.reason, Some(FailReason::NotAuthenticated));

    let rsp = client.register("x", "pw", Role::Player).await.unwrap();
    assert_eq!(rsp.reason, Some(FailReason::InvalidRequest));
    let rsp = client
        .request(json!({"action": "REGISTER", "username": "bob", "password": "pw", "role": "admin"}))
        .await
        .unwrap();
    assert_eq!(rsp.reason, Some(FailReason::InvalidRequest));

    assert!(client.register("bob", "pw", Role::Developer).await.unwrap().is_success());
}

#[tokio::test]
async fn protocol_violations_close_the_connection() {
    let lobby = TestLobby::new().await;

    let (client, server) = duplex(1024);
    let con = ClientConnectionDescriptor::new(900, 5555, "127.0.0.1".to_string(), 40900);
    tokio::spawn(run_session(server, con, lobby.sstate.clone()));
    let mut framed = Framed::new(client, FrameCodec::new());
    send_frame(&mut framed, Bytes::from_static(b"this is not json")).await.unwrap();
    let next = tokio::time::timeout(Duration::from_secs(5), framed.next())
        .await
        .expect("session should hang up");
    assert!(next.is_none());

    let (mut client, server) = duplex(1024);
    let con = ClientConnectionDescriptor::new(901, 5555, "127.0.0.1".to_string(), 40901);
    let session = tokio::spawn(run_session(server, con, lobby.sstate.clone()));
    client.write_all(&[0, 0, 0, 0]).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .expect("zero length frame should end the session")
        .unwrap();
}

#[tokio::test]
async fn only_developers_upload_and_nothing_is_read_after_refusal() {
    let lobby = TestLobby::new().await;
    let mut player = lobby.user("pat", Role::Player).await;

    let rsp = publish(&lobby, &mut player, &upload("Foo", "1.0.0", 2), false).await;
    assert_eq!(rsp.status, Status::Fail);
    assert_eq!(rsp.reason, Some(FailReason::NotAuthorized));

    // The stream is still in sync
    assert!(player.list_games().await.unwrap().is_empty());
}

#[tokio::test]
async fn match_scenario_with_version_snapshot_and_reviews() {
    let lobby = TestLobby::new().await;
    let mut dev = lobby.user("dev", Role::Developer).await;

    let rsp = publish(&lobby, &mut dev, &upload("Foo", "1.0.0", 2), false).await;
    assert!(rsp.is_success(), "{:?}", rsp);

    let games = dev.list_games().await.unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].name, "Foo");
    assert_eq!(games[0].avg_rating, None);
    assert_eq!(games[0].review_count, 0);

    let mut alice = lobby.user("alice", Role::Player).await;
    let mut bob = lobby.user("bob", Role::Player).await;
    let mut carol = lobby.user("carol", Role::Player).await;

    let created = alice.create_room("Foo").await.unwrap();
    assert!(created.is_success());
    let id = room_id(&created);

    let waiting = alice.check_room(id).await.unwrap();
    assert_eq!(waiting.get("game_start"), Some(&json!(false)));
    assert_eq!(waiting.get("players"), Some(&json!(["alice"])));
    assert_eq!(waiting.get("max_players"), Some(&json!(2)));

    let joined = bob.join_room(id).await.unwrap();
    assert!(joined.is_success());
    assert_eq!(joined.get("game_start"), Some(&json!(true)));
    assert_eq!(lobby.launcher.launch_count(), 1);

    let seen_by_alice = alice.check_room(id).await.unwrap();
    let seen_by_bob = bob.check_room(id).await.unwrap();
    for rsp in [&seen_by_alice, &seen_by_bob] {
        assert_eq!(rsp.get("game_start"), Some(&json!(true)));
        assert_eq!(rsp.get("game_ip"), joined.get("game_ip"));
        assert_eq!(rsp.get("game_port"), joined.get("game_port"));
        assert_eq!(rsp.get("version"), Some(&json!("1.0.0")));
        assert_eq!(rsp.get("match_status"), Some(&json!("RUNNING")));
    }

    let late = carol.join_room(id).await.unwrap();
    assert_eq!(late.reason, Some(FailReason::RoomNotWaiting));

    let rsp = publish(&lobby, &mut dev, &upload("Foo", "1.0.1", 2), true).await;
    assert!(rsp.is_success(), "{:?}", rsp);
    let after_update = alice.check_room(id).await.unwrap();
    assert_eq!(after_update.get("version"), Some(&json!("1.0.0")));
    assert_eq!(dev.list_games().await.unwrap()[0].version, "1.0.1");
    assert_eq!(lobby.launcher.launches()[0].version, "1.0.0");

    let rsp = carol.submit_review("Foo", 5, "never played").await.unwrap();
    assert_eq!(rsp.reason, Some(FailReason::NotEligible));
    let rsp = alice.submit_review("Foo", 0, "").await.unwrap();
    assert_eq!(rsp.reason, Some(FailReason::InvalidRequest));

    assert!(alice.submit_review("Foo", 5, "fun").await.unwrap().is_success());
    assert!(bob.submit_review("Foo", 1, "meh").await.unwrap().is_success());
    let rsp = bob.submit_review("Foo", 2, "grew on me").await.unwrap();
    assert_eq!(rsp.message.as_deref(), Some("Review updated"));

    let games = carol.list_games().await.unwrap();
    assert_eq!(games[0].review_count, 2);
    assert_eq!(games[0].avg_rating, Some(3.5));

    let reviews = carol.get_reviews("Foo").await.unwrap();
    assert_eq!(reviews.get("reviews").unwrap().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_joins_fill_the_room_once() {
    let lobby = TestLobby::new().await;
    let mut dev = lobby.user("dev", Role::Developer).await;
    assert!(publish(&lobby, &mut dev, &upload("Trio", "1", 3), false).await.is_success());

    let mut owner = lobby.user("owner", Role::Player).await;
    let id = room_id(&owner.create_room("Trio").await.unwrap());

    let mut joiners = Vec::new();
    for i in 0..5 {
        joiners.push(lobby.user(&format!("joiner{}", i), Role::Player).await);
    }
    let results =
        futures::future::join_all(joiners.iter_mut().map(|client| client.join_room(id))).await;

    let admitted = results
        .iter()
        .filter(|rsp| rsp.as_ref().unwrap().is_success())
        .count();
    assert_eq!(admitted, 2);
    assert_eq!(lobby.launcher.launch_count(), 1);

    let room = lobby.sstate.rooms.check_room(id).unwrap();
    assert_eq!(room.players.len(), 3);
}

#[tokio::test]
async fn download_reproduces_the_client_tree() {
    let lobby = TestLobby::new().await;
    let mut dev = lobby.user("dev", Role::Developer).await;

    // Incompressible data, so the archive spans several frames
    let mut seed: u32 = 12345;
    let level: Vec<u8> = (0..150_000)
        .map(|_| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (seed >> 16) as u8
        })
        .collect();

    let archive = lobby.path().join("foo.zip");
    write_zip(
        &archive,
        &[
            ("client/run.py", b"print('hello')"),
            ("client/data/level1.bin", &level),
            ("server/game_server.py", b"secret server code"),
        ],
    );
    let rsp = dev
        .upload_game(&upload("Foo", "1.0.0", 2), &archive, false)
        .await
        .unwrap();
    assert!(rsp.is_success(), "{:?}", rsp);

    let downloads = lobby.path().join("downloads");
    let mut pat = lobby.user("pat", Role::Player).await;
    let installed = pat.download_game("Foo", &downloads).await.unwrap().unwrap();
    assert_eq!(installed, downloads.join("pat").join("Foo"));
    assert_eq!(fs::read(installed.join("run.py")).unwrap(), b"print('hello')");
    assert_eq!(fs::read(installed.join("data/level1.bin")).unwrap(), level);
    assert!(!installed.join("server").exists());
    assert!(!installed.join("game_server.py").exists());

    // A second download replaces the install
    fs::write(installed.join("stale.txt"), b"old").unwrap();
    pat.download_game("Foo", &downloads).await.unwrap().unwrap();
    assert!(!installed.join("stale.txt").exists());
    assert!(installed.join("run.py").is_file());

    let missing = pat.download_game("Nope", &downloads).await.unwrap().unwrap_err();
    assert_eq!(missing.reason, Some(FailReason::NotFound));
}

#[tokio::test]
async fn catalog_ownership_and_archive_rules() {
    let lobby = TestLobby::new().await;
    let mut dev = lobby.user("dev", Role::Developer).await;
    let mut eve = lobby.user("eve", Role::Developer).await;

    assert!(publish(&lobby, &mut dev, &upload("Foo", "1.0.0", 2), false).await.is_success());

    let rsp = publish(&lobby, &mut eve, &upload("Foo", "6.6.6", 2), false).await;
    assert_eq!(rsp.reason, Some(FailReason::NameTaken));
    let rsp = publish(&lobby, &mut eve, &upload("Foo", "6.6.6", 2), true).await;
    assert_eq!(rsp.reason, Some(FailReason::NotAuthorized));
    let rsp = publish(&lobby, &mut dev, &upload("Bar", "1.0", 2), true).await;
    assert_eq!(rsp.reason, Some(FailReason::NotFound));
    let rsp = publish(&lobby, &mut dev, &upload("Solo", "1.0", 1), false).await;
    assert_eq!(rsp.reason, Some(FailReason::InvalidRequest));
    let rsp = publish(&lobby, &mut dev, &upload("Bad!Name", "1.0", 2), false).await;
    assert_eq!(rsp.reason, Some(FailReason::InvalidRequest));

    let no_client = lobby.path().join("no-client.zip");
    write_zip(&no_client, &[("server/game_server.py", b"print('server')")]);
    let rsp = dev
        .upload_game(&upload("Broken", "1.0", 2), &no_client, false)
        .await
        .unwrap();
    assert_eq!(rsp.reason, Some(FailReason::InvalidArchive));

    let garbage = lobby.path().join("garbage.zip");
    fs::write(&garbage, b"this is not a zip archive").unwrap();
    let rsp = dev
        .upload_game(&upload("Garbage", "1.0", 2), &garbage, false)
        .await
        .unwrap();
    assert_eq!(rsp.reason, Some(FailReason::InvalidArchive));

    let names: Vec<String> = dev
        .list_games()
        .await
        .unwrap()
        .into_iter()
        .map(|game| game.name)
        .collect();
    assert_eq!(names, vec!["Foo".to_string()]);

    let mine = dev.request(json!({"action": "LIST_MY_GAMES"})).await.unwrap();
    assert_eq!(mine.get("games").unwrap().as_array().unwrap().len(), 1);
    let theirs = eve.request(json!({"action": "LIST_MY_GAMES"})).await.unwrap();
    assert!(theirs.get("games").unwrap().as_array().unwrap().is_empty());

    let info = eve
        .request(json!({"action": "GAME_INFO", "game_name": "Foo"}))
        .await
        .unwrap();
    assert_eq!(info.get("game").unwrap()["author"], "dev");
    let info = eve
        .request(json!({"action": "GAME_INFO", "game_name": "Nope"}))
        .await
        .unwrap();
    assert_eq!(info.reason, Some(FailReason::NotFound));
}

#[tokio::test]
async fn deleting_a_game_keeps_its_reviews() {
    let lobby = TestLobby::new().await;
    let mut dev = lobby.user("dev", Role::Developer).await;
    let mut eve = lobby.user("eve", Role::Developer).await;
    assert!(publish(&lobby, &mut dev, &upload("Foo", "1.0.0", 2), false).await.is_success());

    let mut alice = lobby.user("alice", Role::Player).await;
    let id = room_id(&alice.create_room("Foo").await.unwrap());
    assert!(alice.leave_room(id).await.unwrap().is_success());
    assert!(alice.submit_review("Foo", 4, "short but sweet").await.unwrap().is_success());

    let rsp = eve
        .request(json!({"action": "DELETE_GAME", "game_name": "Foo"}))
        .await
        .unwrap();
    assert_eq!(rsp.reason, Some(FailReason::NotAuthorized));

    let rsp = dev
        .request(json!({"action": "DELETE_GAME", "game_name": "Foo"}))
        .await
        .unwrap();
    assert!(rsp.is_success(), "{:?}", rsp);

    assert!(dev.list_games().await.unwrap().is_empty());
    let layout = &lobby.sstate.layout;
    assert!(!layout.game_dir("Foo").exists());
    assert!(!layout.client_archive("Foo").exists());
    assert!(!layout.developer_archive("Foo").exists());

    let downloads = lobby.path().join("downloads");
    let rsp = alice.download_game("Foo", &downloads).await.unwrap().unwrap_err();
    assert_eq!(rsp.reason, Some(FailReason::NotFound));

    let reviews = alice.get_reviews("Foo").await.unwrap();
    assert_eq!(reviews.get("reviews").unwrap().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn room_lifecycle_errors() {
    let lobby = TestLobby::new().await;
    let mut dev = lobby.user("dev", Role::Developer).await;
    assert!(publish(&lobby, &mut dev, &upload("Foo", "1.0.0", 2), false).await.is_success());
    let mut alice = lobby.user("alice", Role::Player).await;
    let mut bob = lobby.user("bob", Role::Player).await;

    assert_eq!(
        alice.create_room("Nope").await.unwrap().reason,
        Some(FailReason::NotFound)
    );
    assert_eq!(alice.join_room(999).await.unwrap().reason, Some(FailReason::NotFound));
    assert_eq!(alice.check_room(999).await.unwrap().reason, Some(FailReason::NotFound));

    let id = room_id(&alice.create_room("Foo").await.unwrap());
    assert_eq!(
        alice.create_room("Foo").await.unwrap().reason,
        Some(FailReason::AlreadyInRoom)
    );

    let listing = bob.list_rooms().await.unwrap();
    let rooms = listing.get("rooms").unwrap().as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["room_id"], id);
    assert_eq!(rooms[0]["owner"], "alice");
    assert_eq!(rooms[0]["players"], json!(["alice"]));

    lobby.launcher.set_failing(true);
    let rsp = bob.join_room(id).await.unwrap();
    assert_eq!(rsp.reason, Some(FailReason::LaunchFailed));
    let still_waiting = alice.check_room(id).await.unwrap();
    assert_eq!(still_waiting.get("players"), Some(&json!(["alice"])));

    lobby.launcher.set_failing(false);
    assert_eq!(bob.join_room(id).await.unwrap().get("game_start"), Some(&json!(true)));
    assert!(bob.list_rooms().await.unwrap().get("rooms").unwrap().as_array().unwrap().is_empty());

    lobby.sstate.rooms.set_match_status(
        id,
        MatchStatus::Failed {
            reason: "match server exited with status 1".to_string(),
        },
    );
    let rsp = alice.check_room(id).await.unwrap();
    assert_eq!(rsp.reason, Some(FailReason::MatchFailed));

    let other = room_id(&alice.create_room("Foo").await.unwrap());
    let rsp = alice.leave_room(other).await.unwrap();
    assert!(rsp.is_success());
    assert_eq!(alice.check_room(other).await.unwrap().reason, Some(FailReason::NotFound));
}

#[tokio::test]
async fn room_capacity_is_bounded_at_upload() {
    let lobby = TestLobby::new().await;
    let mut dev = lobby.user("dev", Role::Developer).await;

    for max_players in [1, 65, 3_000_000_000] {
        let rsp = publish(&lobby, &mut dev, &upload("Huge", "1.0.0", max_players), false).await;
        assert_eq!(rsp.reason, Some(FailReason::InvalidRequest), "{}", max_players);
    }
    assert!(dev.list_games().await.unwrap().is_empty());

    let rsp = publish(&lobby, &mut dev, &upload("Huge", "1.0.0", 64), false).await;
    assert!(rsp.is_success(), "{:?}", rsp);
    assert_eq!(dev.list_games().await.unwrap()[0].max_players, 64);

    let mut alice = lobby.user("alice", Role::Player).await;
    let created = alice.create_room("Huge").await.unwrap();
    assert_eq!(created.get("max_players"), Some(&json!(64)));
    let mut bob = lobby.user("bob", Role::Player).await;
    let joined = bob.join_room(room_id(&created)).await.unwrap();
    assert!(joined.is_success());
    assert_eq!(joined.get("game_start"), Some(&json!(false)));
}

#[tokio::test]
async fn disconnect_and_logout_leave_the_waiting_room() {
    let lobby = TestLobby::new().await;
    let mut dev = lobby.user("dev", Role::Developer).await;
    assert!(publish(&lobby, &mut dev, &upload("Foo", "1.0.0", 2), false).await.is_success());

    let mut alice = lobby.user("alice", Role::Player).await;
    let abandoned = room_id(&alice.create_room("Foo").await.unwrap());
    drop(alice);

    let mut alice = lobby.connect();
    let mut admitted = false;
    for _ in 0..100 {
        if alice.login("alice", "pw").await.unwrap().is_success() {
            admitted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(admitted);

    // The room emptied out when its only member went away
    let mut bob = lobby.user("bob", Role::Player).await;
    assert_eq!(bob.join_room(abandoned).await.unwrap().reason, Some(FailReason::NotFound));
    assert_eq!(lobby.launcher.launch_count(), 0);

    let created = alice.create_room("Foo").await.unwrap();
    assert!(created.is_success(), "{:?}", created);
    let id = room_id(&created);

    assert!(alice.logout().await.unwrap().is_success());
    assert_eq!(bob.join_room(id).await.unwrap().reason, Some(FailReason::NotFound));
    assert!(bob.create_room("Foo").await.unwrap().is_success());
    assert_eq!(lobby.launcher.launch_count(), 0);
}
