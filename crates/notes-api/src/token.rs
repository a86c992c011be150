use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use notes_types::api::Claims;
use notes_types::models::User;

/// Signs and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: chrono::Duration::days(ttl_days),
        }
    }

    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            exp: (chrono::Utc::now() + self.ttl).timestamp() as usize,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_to_same_identity() {
        let issuer = TokenIssuer::new("secret", 30);
        let user = User::new("ann@x.com", chrono::Utc::now());

        let token = issuer.issue(&user).unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "ann@x.com");
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let user = User::new("ann@x.com", chrono::Utc::now());
        let token = TokenIssuer::new("one", 30).issue(&user).unwrap();
        assert!(TokenIssuer::new("two", 30).verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = TokenIssuer::new("secret", -1);
        let user = User::new("ann@x.com", chrono::Utc::now());
        let token = issuer.issue(&user).unwrap();
        assert!(issuer.verify(&token).is_err());
    }
}
