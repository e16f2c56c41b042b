use async_trait::async_trait;

use super::{ApiClient, ApiError};
use crate::models::UserProfile;
use crate::state::ProfileService;

/// Looks profiles up in the `users` table through the REST API.
pub struct RestProfileService {
    client: ApiClient,
}

impl RestProfileService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

const USERS_PATH: &str = "/rest/v1/users";

fn profile_query(email: &str) -> [(&'static str, String); 2] {
    [("email", format!("eq.{}", email)), ("select", "*".to_string())]
}

#[async_trait(?Send)]
impl ProfileService for RestProfileService {
    async fn get_user_profile(&self, email: &str) -> Result<Option<UserProfile>, ApiError> {
        let rows: Vec<UserProfile> = self
            .client
            .get_with_query(USERS_PATH, &profile_query(email))
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_url(email: &str) -> String {
        let client = ApiClient::new("http://localhost:54321", "anon").unwrap();
        let request = client
            .query_request(USERS_PATH, &profile_query(email))
            .build()
            .unwrap();
        request.url().to_string()
    }

    #[test]
    fn test_profile_query_escapes_email() {
        assert_eq!(
            profile_url("ana@school.edu"),
            "http://localhost:54321/rest/v1/users?email=eq.ana%40school.edu&select=*"
        );
        assert_eq!(
            profile_url("a+b&c@school.edu"),
            "http://localhost:54321/rest/v1/users?email=eq.a%2Bb%26c%40school.edu&select=*"
        );
    }
}
