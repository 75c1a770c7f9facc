use tracing::info;

use crate::lobby_errors::{FailReason, LobbyErr};
use crate::request::{Response, ReviewRequest};
use crate::session::ClientSession;
use crate::store::{NewReview, ReviewOutcome};

const MAX_COMMENT_LEN: usize = 1000;

pub async fn hdl_submit_review(
    session: &mut ClientSession,
    rq: ReviewRequest,
) -> Result<Response, LobbyErr> {
    let username = match session.require_account() {
        Ok(account) => account.username.clone(),
        Err(rsp) => return Ok(rsp),
    };

    let rating = match u8::try_from(rq.rating) {
        Ok(rating @ 1..=5) => rating,
        _ => {
            return Ok(Response::fail(
                FailReason::InvalidRequest,
                "Rating must be between 1 and 5",
            ))
        }
    };
    if rq.comment.chars().count() > MAX_COMMENT_LEN {
        return Ok(Response::fail(
            FailReason::InvalidRequest,
            format!("Comment must not be longer than {} characters", MAX_COMMENT_LEN),
        ));
    }

    let review = NewReview {
        game_name: rq.game_name,
        username,
        rating,
        comment: rq.comment,
    };
    let rsp = match session.sstate.store.add_review(&review).await? {
        ReviewOutcome::Added => Response::success_msg("Review submitted"),
        ReviewOutcome::Replaced => Response::success_msg("Review updated"),
        ReviewOutcome::NotEligible => {
            return Ok(Response::fail(
                FailReason::NotEligible,
                "You can only review games you have played",
            ))
        }
        ReviewOutcome::GameNotFound => {
            return Ok(Response::fail(
                FailReason::NotFound,
                format!("Game '{}' does not exist", review.game_name),
            ))
        }
    };

    info!(target: "catalog", "{} rated {} with {}", review.username, review.game_name, review.rating);
    Ok(rsp)
}
