//! Registered identity sent verbatim to the authentication endpoint

use common::Secret;
use serde::Serialize;

/// The six identity fields issued at registration time.
///
/// `access_code` and `client_secret` stay wrapped in `Secret` so that a
/// `Debug` of the config never prints them.
#[derive(Debug, Clone)]
pub struct Identity {
    pub email: String,
    pub name: String,
    pub roll_no: String,
    pub access_code: Secret<String>,
    pub client_id: String,
    pub client_secret: Secret<String>,
}

/// Wire shape of the authentication request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthRequest<'a> {
    email: &'a str,
    name: &'a str,
    roll_no: &'a str,
    access_code: &'a str,
    #[serde(rename = "clientID")]
    client_id: &'a str,
    client_secret: &'a str,
}

impl Identity {
    pub(crate) fn auth_request(&self) -> AuthRequest<'_> {
        AuthRequest {
            email: &self.email,
            name: &self.name,
            roll_no: &self.roll_no,
            access_code: self.access_code.expose(),
            client_id: &self.client_id,
            client_secret: self.client_secret.expose(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_identity() -> Identity {
    Identity {
        email: "student@example.edu".into(),
        name: "Test Student".into(),
        roll_no: "21CS1001".into(),
        access_code: Secret::new("AbCdEf".into()),
        client_id: "client-123".into(),
        client_secret: Secret::new("s3cr3t".into()),
    }
}
