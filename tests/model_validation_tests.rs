use chrono::{TimeZone, Utc};
use scholar_vault::{
    models::{
        AccountRequest, AdminSearchRequest, CreateCommentRequest, EnquiryRequest, GuidelineRequest,
        SendMessageRequest, SubmitThesisRequest, Thesis, ThesisResponse, TrackRequest,
        UpdateUserRequest, User, UserResponse,
    },
    validation::Validate,
};
use serde_json::json;

// --- Test Utilities ---

fn fields<T: Validate>(payload: &T) -> Vec<String> {
    match payload.validate() {
        Ok(()) => vec![],
        Err(errors) => errors.into_iter().map(|e| e.field).collect(),
    }
}

fn valid_account() -> AccountRequest {
    serde_json::from_value(json!({
        "email": "ada@example.com",
        "password": "analytical-engine",
        "firstname": "Ada",
        "lastname": "Lovelace",
        "gender": "female",
        "dob": "1815-12-10",
        "phone": "+441234567890",
        "address": "London",
        "profilePic": "https://cdn.example.com/ada.png",
        "role": "scholar"
    }))
    .unwrap()
}

// --- Request Validation ---

#[test]
fn test_valid_account_passes() {
    assert!(fields(&valid_account()).is_empty());
}

#[test]
fn test_account_phone_length_bounds() {
    let mut account = valid_account();
    account.phone = "1234567890123456".to_string();
    assert_eq!(fields(&account), vec!["phone"]);
    account.phone = "123456789".to_string();
    assert_eq!(fields(&account), vec!["phone"]);
}

#[test]
fn test_missing_account_fields_default_to_empty_and_fail() {
    let account: AccountRequest = serde_json::from_value(json!({})).unwrap();
    let failed = fields(&account);
    for field in ["email", "password", "firstname", "lastname", "dob", "address", "role"] {
        assert!(failed.contains(&field.to_string()), "missing {field}");
    }
}

#[test]
fn test_partial_user_update_only_checks_present_fields() {
    let empty = UpdateUserRequest::default();
    assert!(fields(&empty).is_empty());

    let update: UpdateUserRequest = serde_json::from_value(json!({
        "password": "12345",
        "role_name": "guest",
        "gender": "female"
    }))
    .unwrap();
    assert_eq!(fields(&update), vec!["role_name", "password"]);
}

#[test]
fn test_thesis_title_bounds() {
    let too_long = SubmitThesisRequest {
        title: "t".repeat(256),
        ..SubmitThesisRequest::default()
    };
    assert_eq!(fields(&too_long), vec!["title"]);

    let ok = SubmitThesisRequest {
        title: "t".repeat(255),
        ..SubmitThesisRequest::default()
    };
    assert!(fields(&ok).is_empty());
}

#[test]
fn test_admin_search_dates_and_status() {
    let search: AdminSearchRequest = serde_json::from_value(json!({
        "start_date": "2026-01-01",
        "end_date": "2026-01-31T23:59:59Z",
        "status": "approved",
        "keywords": ["ai", "ml"]
    }))
    .unwrap();
    assert!(fields(&search).is_empty());

    let bad: AdminSearchRequest =
        serde_json::from_value(json!({"end_date": "31/01/2026", "status": "done"})).unwrap();
    assert_eq!(fields(&bad), vec!["end_date", "status"]);
}

#[test]
fn test_ids_are_required_where_referenced() {
    assert_eq!(fields(&CreateCommentRequest::default()), vec!["thesis_id", "message_content"]);
    assert_eq!(fields(&SendMessageRequest::default()), vec!["receiverId", "content"]);
    assert_eq!(fields(&TrackRequest::default()), vec!["thesisId", "ipAddress"]);
}

#[test]
fn test_ip_address_is_capped_at_45_chars() {
    let track = TrackRequest {
        thesis_id: Some(1),
        ip_address: "f".repeat(46),
    };
    assert_eq!(fields(&track), vec!["ipAddress"]);
}

#[test]
fn test_guideline_file_url_is_optional_but_checked() {
    let no_file = GuidelineRequest {
        title: "Formatting".to_string(),
        description: "Margins".to_string(),
        file_url: Some(String::new()),
    };
    assert!(fields(&no_file).is_empty());

    let bad_file = GuidelineRequest {
        file_url: Some("not a url".to_string()),
        ..no_file
    };
    assert_eq!(fields(&bad_file), vec!["file_url"]);
}

#[test]
fn test_enquiry_limits() {
    let enquiry = EnquiryRequest {
        name: "n".repeat(51),
        email: format!("{}@example.com", "e".repeat(40)),
        subject: "s".repeat(101),
        message: "Hello".to_string(),
    };
    assert_eq!(fields(&enquiry), vec!["name", "email", "subject"]);
}

// --- Response Mapping ---

#[test]
fn test_user_response_never_carries_secrets() {
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let user = User {
        id: 42,
        username: "ada@example.com".to_string(),
        email: "ada@example.com".to_string(),
        password_hash: "$2b$04$secret".to_string(),
        role_id: 3,
        firstname: "Ada".to_string(),
        lastname: "Lovelace".to_string(),
        gender: None,
        dob: None,
        phone: None,
        address: None,
        profile_pic: None,
        verified: true,
        email_verified: Some(at),
        verification_token: Some("vtoken".to_string()),
        verification_token_expires: Some(at),
        reset_token: Some("rtoken".to_string()),
        reset_token_expires: Some(at),
        created_at: at,
        updated_at: at,
    };

    let json = serde_json::to_value(UserResponse::from(user)).unwrap();
    assert_eq!(json["id"], "42");
    assert_eq!(json["role_id"], "3");
    let text = json.to_string();
    assert!(!text.contains("secret"));
    assert!(!text.contains("vtoken"));
    assert!(!text.contains("rtoken"));
}

#[test]
fn test_thesis_response_uses_wire_names() {
    let at = Utc::now();
    let thesis = Thesis {
        thesis_id: 9,
        title: "Wire Names".to_string(),
        abstract_text: Some("Summary".to_string()),
        keywords: vec!["serde".to_string()],
        category: "AI".to_string(),
        document_url: None,
        status: "pending".to_string(),
        author_id: 1,
        reviewer_id: None,
        upvotes: 0,
        downvotes: 0,
        views_count: 0,
        downloads_count: 0,
        created_at: at,
        updated_at: at,
    };

    let json = serde_json::to_value(ThesisResponse::from(thesis)).unwrap();
    assert_eq!(json["thesis_id"], "9");
    assert_eq!(json["abstract"], "Summary");
    assert!(json["reviewer_id"].is_null());
    assert!(json.get("author").is_none());
}
