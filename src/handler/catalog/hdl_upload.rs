use tracing::{debug, info, warn};

use crate::lobby_errors::{FailReason, LobbyErr};
use crate::packet::{send_json, LobbyFramed, LobbyStream};
use crate::request::{Response, UploadRequest};
use crate::session::ClientSession;
use crate::sharedstate::SharedState;
use crate::store::{Account, GameRecord, MAX_PLAYERS_LIMIT};
use crate::transfer::{install_game, receive_to_file, run_blocking};
use crate::utils::data_validation::game_name::game_name_validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// `UPLOAD`: the name must be free.
    New,
    /// `UPDATE_GAME`: the game must exist and belong to the uploader.
    Update,
}

/// `UPLOAD` and `UPDATE_GAME`.
///
/// ```text
/// client                          lobby
///   {action, game_name, size..} ->
///                               <- READY | FAIL
///   binary frames (size bytes)  ->
///                               <- SUCCESS | FAIL
/// ```
pub async fn hdl_upload<S: LobbyStream>(
    session: &mut ClientSession,
    framed: &mut LobbyFramed<S>,
    rq: UploadRequest,
    kind: UploadKind,
) -> Result<Response, LobbyErr> {
    let account = match session.require_developer() {
        Ok(account) => account.clone(),
        Err(rsp) => return Ok(rsp),
    };
    let sstate = session.sstate.clone();

    if let Err(rsp) = validate_upload(&sstate, &rq) {
        return Ok(rsp);
    }
    if let Some(rsp) = check_catalog_slot(&sstate, &account, &rq.game_name, kind).await? {
        return Ok(rsp);
    }

    send_json(framed, &Response::ready()).await?;
    let staged = sstate.layout.staging_file(&rq.game_name);
    if let Err(err) = receive_to_file(framed, rq.size, &staged).await {
        discard(&staged).await;
        return Err(err);
    }
    debug!(
        target: "catalog",
        "{} sent {} bytes for {} ({:?})",
        account.username,
        rq.size,
        rq.game_name,
        rq.filename
    );

    let _catalog = sstate.catalog_lock.lock().await;

    // The slot may have been taken while the bytes were in flight
    if let Some(rsp) = check_catalog_slot(&sstate, &account, &rq.game_name, kind).await? {
        discard(&staged).await;
        return Ok(rsp);
    }

    let layout = sstate.layout.clone();
    let name = rq.game_name.clone();
    let archive = staged.clone();
    let installed = match run_blocking(move || install_game(&layout, &name, &archive)).await? {
        Ok(installed) => installed,
        Err(err) => {
            discard(&staged).await;
            if err.is_invalid_archive() {
                info!(target: "catalog", "Rejected archive for {}: {}", rq.game_name, err);
                return Ok(Response::fail(
                    FailReason::InvalidArchive,
                    format!("Invalid game archive: {}", err),
                ));
            }
            return Err(err.into());
        }
    };

    let record = GameRecord {
        name: rq.game_name.clone(),
        version: rq.version.clone(),
        description: rq.description.clone(),
        author: account.username.clone(),
        max_players: rq.max_players,
        archive_path: installed.archive_path,
        client_archive_path: installed.client_archive_path,
    };
    let committed = match kind {
        UploadKind::New => sstate.store.add_game(&record).await?,
        UploadKind::Update => sstate.store.update_game(&record).await?,
    };
    if !committed {
        // Files are already in place; the next successful upload overwrites them
        warn!(target: "catalog", "Catalog rejected {} after its files were installed", record.name);
        return Ok(Response::fail(
            FailReason::Internal,
            format!("Could not store game '{}'", record.name),
        ));
    }

    let msg = match kind {
        UploadKind::New => format!("Game '{}' uploaded", record.name),
        UploadKind::Update => format!("Game '{}' updated to version {}", record.name, record.version),
    };
    info!(
        target: "catalog",
        "{} v{} ({} players) published by {}",
        record.name,
        record.version,
        record.max_players,
        record.author
    );
    Ok(Response::success_msg(msg)
        .with("game_name", record.name)
        .with("version", record.version))
}

fn validate_upload(sstate: &SharedState, rq: &UploadRequest) -> Result<(), Response> {
    if let Err(err) = game_name_validate(&rq.game_name) {
        return Err(Response::fail(FailReason::InvalidRequest, err.to_string()));
    }
    if rq.version.trim().is_empty() {
        return Err(Response::fail(
            FailReason::InvalidRequest,
            "Version must not be empty",
        ));
    }
    if rq.max_players < 2 || rq.max_players > MAX_PLAYERS_LIMIT {
        return Err(Response::fail(
            FailReason::InvalidRequest,
            format!("max_players must be between 2 and {}", MAX_PLAYERS_LIMIT),
        ));
    }
    if rq.size == 0 || rq.size > sstate.config.max_upload_bytes {
        return Err(Response::fail(
            FailReason::InvalidRequest,
            format!(
                "Archive size must be between 1 and {} bytes",
                sstate.config.max_upload_bytes
            ),
        ));
    }
    Ok(())
}

async fn check_catalog_slot(
    sstate: &SharedState,
    account: &Account,
    game_name: &str,
    kind: UploadKind,
) -> Result<Option<Response>, LobbyErr> {
    let existing = sstate.store.find_game(game_name).await?;
    Ok(match (kind, existing) {
        (UploadKind::New, Some(_)) => Some(Response::fail(
            FailReason::NameTaken,
            format!("A game named '{}' already exists", game_name),
        )),
        (UploadKind::Update, None) => Some(Response::fail(
            FailReason::NotFound,
            format!("Game '{}' does not exist", game_name),
        )),
        (UploadKind::Update, Some(game)) if game.author != account.username => {
            Some(Response::fail(
                FailReason::NotAuthorized,
                format!("Only {} can update '{}'", game.author, game_name),
            ))
        }
        _ => None,
    })
}

async fn discard(staged: &std::path::Path) {
    if let Err(err) = tokio::fs::remove_file(staged).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(target: "transfer", "Could not remove {}: {}", staged.display(), err);
        }
    }
}
