use arena_contracts as contract;
use arena_store::{ClientAuthorization, OAuthClient};

use super::text;

/// The API secret never leaves the service.
pub fn map_client(client: &OAuthClient) -> contract::Client {
    contract::Client {
        client_id: client.client_id,
        name: client.name.clone(),
        api_key: client.api_key.clone(),
        callback_url: text(&client.callback_url),
        scopes: client.scopes.clone(),
        active: client.active,
    }
}

pub fn map_authorization(
    authorization: &ClientAuthorization,
    client: Option<&OAuthClient>,
) -> contract::Authorization {
    contract::Authorization {
        client_id: authorization.client_id,
        client_name: client.map(|c| c.name.clone()).unwrap_or_default(),
        api_key: client.map(|c| c.api_key.clone()).unwrap_or_default(),
        login_id: authorization.login_id.clone(),
        scopes: authorization.scopes.clone(),
        date_granted: Some(authorization.date_granted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_projection_omits_secret() {
        let client = OAuthClient {
            client_id: 1,
            name: "Mobile App".to_string(),
            api_key: "mobile-key".to_string(),
            api_secret: "mobile-secret".to_string(),
            callback_url: String::new(),
            scopes: vec!["person".to_string()],
            active: true,
        };
        let mapped = map_client(&client);
        let json = serde_json::to_string(&mapped).unwrap();
        assert!(!json.contains("mobile-secret"));
        assert!(!json.contains("CallbackUrl"));
        assert_eq!(mapped.api_key, "mobile-key");
    }
}
