use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::validation::validate_not_blank;

/// Level1 ballot: index of the chosen option.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteOptionRequest {
    pub option: usize,
}

/// Level2 ballot: id of the player believed to own the secret.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct VoteTargetRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub target: String,
}

/// Level3 guess.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GuessRequest {
    #[validate(range(min = 2))]
    pub guess: u32,
}
