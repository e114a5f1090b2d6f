use crate::api::{ApiClient, ApiRequest};
use crate::error::ClientResult;
use crate::models::{UserId, UserProfile};

pub async fn profile(api: &ApiClient, user_id: UserId) -> ClientResult<UserProfile> {
    api.fetch(ApiRequest::get(format!("/api/users/{user_id}/"))).await
}
