use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::error::Result;

/// Claims behind a presigned storage URL: the file key it grants and when
/// the grant ends.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShareClaims {
    pub sub: String,
    pub exp: u64,
}

pub fn sign_share(file_key: &str, expires_in: u64, secret: &str) -> Result<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map_err(|_| Error::UnableToSignShareToken)?.as_secs();
    let claims = ShareClaims {
        sub: file_key.to_string(),
        exp: now + expires_in,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(|_| Error::UnableToSignShareToken)
}

pub fn verify_share(token: &str, file_key: &str, secret: &str) -> Result<ShareClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.sub = Some(file_key.to_string());
    validation.leeway = 0;
    let token_data = match decode::<ShareClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(token) => token,
        Err(e) => match e.kind() {
            ErrorKind::InvalidToken => return Err(Error::AuthFailTokenWrongFormat),
            ErrorKind::InvalidSignature => return Err(Error::AuthFailInvalidToken),
            ErrorKind::MissingRequiredClaim(_) => return Err(Error::AuthFailInvalidToken),
            ErrorKind::ExpiredSignature => return Err(Error::AuthFailExpiredToken),
            ErrorKind::InvalidSubject => return Err(Error::ShareTokenInsufficient),
            _ => return Err(Error::AuthFailInvalidToken),
        },
    };
    Ok(token_data.claims)
}


#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "FORTESTONLY";

    #[test]
    fn sign_and_verify_roundtrip() {
        let token = sign_share("bucket-key.jpg", 3600, SECRET).unwrap();
        let claims = verify_share(&token, "bucket-key.jpg", SECRET).unwrap();
        assert_eq!(claims.sub, "bucket-key.jpg");
    }

    #[test]
    fn expired_token() {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let claims = ShareClaims { sub: "k".to_string(), exp: now - 3600 };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();

        let error = verify_share(&token, "k", SECRET).unwrap_err();
        assert!(matches!(error, Error::AuthFailExpiredToken));
    }

    #[test]
    fn token_for_other_file() {
        let token = sign_share("one.jpg", 3600, SECRET).unwrap();
        let error = verify_share(&token, "other.jpg", SECRET).unwrap_err();
        assert!(matches!(error, Error::ShareTokenInsufficient));
    }

    #[test]
    fn token_with_other_secret() {
        let token = sign_share("one.jpg", 3600, "another-secret").unwrap();
        let error = verify_share(&token, "one.jpg", SECRET).unwrap_err();
        assert!(matches!(error, Error::AuthFailInvalidToken));
    }
}
