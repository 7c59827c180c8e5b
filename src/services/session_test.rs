use super::*;

fn sample_session(role: Role) -> Session {
    Session {
        access_token: "access-1".into(),
        refresh_token: "refresh-1".into(),
        user: SessionUser {
            id: "42".into(),
            role,
            name: "Sari".into(),
            email: Some("sari@example.com".into()),
        },
    }
}

// =============================================================================
// Role
// =============================================================================

#[test]
fn role_from_backend_admin_any_case() {
    assert_eq!(Role::from_backend(Some("admin")), Role::Admin);
    assert_eq!(Role::from_backend(Some(" Admin ")), Role::Admin);
}

#[test]
fn role_from_backend_defaults_to_customer() {
    assert_eq!(Role::from_backend(None), Role::Customer);
    assert_eq!(Role::from_backend(Some("user")), Role::Customer);
    assert_eq!(Role::from_backend(Some("")), Role::Customer);
}

#[test]
fn role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    assert_eq!(Role::Customer.as_str(), "customer");
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn can_refresh_requires_refresh_token_and_user_id() {
    let mut session = sample_session(Role::Customer);
    assert!(session.can_refresh());

    session.refresh_token.clear();
    assert!(!session.can_refresh());

    let mut session = sample_session(Role::Customer);
    session.user.id.clear();
    assert!(!session.can_refresh());
}

#[test]
fn rotate_replaces_both_tokens() {
    let mut session = sample_session(Role::Customer);
    session.rotate(TokenPair { access_token: "access-2".into(), refresh_token: "refresh-2".into() });
    assert_eq!(session.access_token, "access-2");
    assert_eq!(session.refresh_token, "refresh-2");
    assert_eq!(session.user.id, "42");
}

#[test]
fn session_json_uses_camel_case() {
    let json = serde_json::to_value(sample_session(Role::Admin)).unwrap();
    assert_eq!(json["accessToken"], "access-1");
    assert_eq!(json["refreshToken"], "refresh-1");
    assert_eq!(json["user"]["role"], "admin");
}

// =============================================================================
// SessionCodec
// =============================================================================

#[test]
fn codec_decodes_what_it_encodes() {
    let codec = SessionCodec::new("secret", 3600);
    let session = sample_session(Role::Admin);
    let token = codec.encode(&session).unwrap();
    assert_eq!(codec.decode(&token).unwrap(), session);
}

#[test]
fn codec_rejects_foreign_secret() {
    let token = SessionCodec::new("secret-a", 3600)
        .encode(&sample_session(Role::Customer))
        .unwrap();
    let err = SessionCodec::new("secret-b", 3600).decode(&token).unwrap_err();
    assert!(matches!(err, SessionError::Invalid(_)));
}

#[test]
fn codec_rejects_tampered_payload() {
    let codec = SessionCodec::new("secret", 3600);
    let token = codec.encode(&sample_session(Role::Customer)).unwrap();
    let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
    parts[1].push('A');
    assert!(codec.decode(&parts.join(".")).is_err());
}

#[test]
fn codec_rejects_garbage() {
    let codec = SessionCodec::new("secret", 3600);
    assert!(codec.decode("").is_err());
    assert!(codec.decode("not.a.jwt").is_err());
}

#[test]
fn codec_rejects_expired_session() {
    let codec = SessionCodec::new("secret", 60);
    let long_ago = OffsetDateTime::now_utc().unix_timestamp() - 86_400;
    let token = codec.encode_at(&sample_session(Role::Customer), long_ago).unwrap();
    assert!(codec.decode(&token).is_err());
}
