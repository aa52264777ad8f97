//! End-to-end flows through the console wiring, using the in-process
//! authorities and an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use partnerdesk_auth::{DemoAuthenticator, Role, Route, SESSION_STORAGE_KEY};
use partnerdesk_companies::{
    CompanyRegistration, DemoRequestGateway, GatewayError, LogoUpload, MAX_LOGO_BYTES, Outcome, RequestError,
    RequestStatus,
};
use partnerdesk_console::{Backend, Command, ConsoleApp, View, execute};
use partnerdesk_core::{CompanyId, InMemoryStore, PersistentStore};
use partnerdesk_notifications::Severity;

const TTL: Duration = Duration::from_millis(4000);

fn demo_app(storage: Arc<InMemoryStore>) -> ConsoleApp {
    ConsoleApp::new(Backend::demo(Duration::ZERO, storage), TTL)
}

fn app_with_authority(storage: Arc<InMemoryStore>, authority: Arc<DemoRequestGateway>) -> ConsoleApp {
    let backend = Backend {
        authenticator: Arc::new(DemoAuthenticator::new()),
        gateway: authority.clone(),
        intake: authority.clone(),
        bearer: authority,
        storage,
    };
    ConsoleApp::new(backend, TTL)
}

fn texts(app: &ConsoleApp) -> Vec<String> {
    app.notifications().entries().into_iter().map(|e| e.text).collect()
}

fn registration(email: &str, logo: LogoUpload) -> CompanyRegistration {
    CompanyRegistration {
        name: "Downtown Tyres".into(),
        email: email.into(),
        phone: "+15550002222".into(),
        address: "9 Ring Rd".into(),
        city: "Denver".into(),
        state: "CO".into(),
        zip_code: "80202".into(),
        country: "USA".into(),
        business_registration_number: "BRN222333".into(),
        tax_id: "TAX333444".into(),
        website: Some("https://downtowntyres.test".into()),
        description: "Tyres while you wait".into(),
        logo,
        password: "hunter22".into(),
    }
}

#[tokio::test(start_paused = true)]
async fn admin_reviews_the_queue() {
    let app = demo_app(Arc::new(InMemoryStore::new()));
    assert_eq!(app.start().await, View::Showing(Route::SignIn));

    execute(&app, "login admin@demo.com password".parse().unwrap()).await;
    assert_eq!(app.location(), Route::AdminRequests);

    let listing = execute(&app, Command::Requests).await;
    assert!(listing.text.contains("AutoFix Garage"), "{}", listing.text);
    assert!(listing.text.contains("1 pending, 1 approved, 1 rejected"), "{}", listing.text);

    let approved = app
        .decide(&CompanyId::new("1"), Outcome::Approved, Some("looks good".into()))
        .await
        .unwrap();
    assert_eq!(approved.status(), RequestStatus::Approved);
    assert_eq!(approved.admin_notes(), Some("looks good"));
    assert_eq!(approved.reviewed_by().map(|u| u.as_str()), Some("1"));

    // Terminal records refuse a second decision and stay as they were.
    let before = app.requests().state().get(&CompanyId::new("2")).cloned().unwrap();
    let err = app
        .decide(&CompanyId::new("2"), Outcome::Approved, Some("looks good".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::InvalidStateTransition { .. }));
    assert_eq!(app.requests().state().get(&CompanyId::new("2")), Some(&before));

    assert_eq!(
        texts(&app)[..2],
        ["Login successful!".to_string(), "Company approved successfully".to_string()]
    );
    assert_eq!(app.notifications().entries()[2].severity, Severity::Error);

    // Every toast expires on its own.
    tokio::time::sleep(TTL + Duration::from_millis(1)).await;
    assert!(app.notifications().is_empty());
    assert_eq!(app.notifications().active_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn company_cannot_reach_the_review_queue() {
    let app = demo_app(Arc::new(InMemoryStore::new()));
    app.start().await;
    app.login("info@autofix.com", "secret1").await.unwrap();
    assert_eq!(app.location(), Route::Dashboard);

    let reply = execute(&app, "approve 1".parse().unwrap()).await;
    assert!(reply.text.starts_with("not permitted"), "{}", reply.text);
    assert_eq!(app.location(), Route::Dashboard);
    assert!(app.requests().requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn session_survives_restart_until_logout() {
    let storage = Arc::new(InMemoryStore::new());

    let first = demo_app(storage.clone());
    first.start().await;
    first.login("admin@demo.com", "password").await.unwrap();
    assert!(storage.contains(SESSION_STORAGE_KEY));

    let second = demo_app(storage.clone());
    assert_eq!(second.start().await, View::Showing(Route::AdminRequests));
    assert_eq!(second.session().state().role(), Some(Role::Admin));
    // The restored session carries its bearer to the authority.
    assert_eq!(second.refresh_requests().await.unwrap().len(), 3);

    second.logout().await;
    assert!(!storage.contains(SESSION_STORAGE_KEY));

    let third = demo_app(storage);
    assert_eq!(third.start().await, View::Showing(Route::SignIn));
}

#[tokio::test(start_paused = true)]
async fn corrupt_session_record_starts_signed_out() {
    let storage = Arc::new(InMemoryStore::new().with_entry(SESSION_STORAGE_KEY, "{not json"));
    let app = demo_app(storage.clone());

    assert_eq!(app.start().await, View::Showing(Route::SignIn));
    assert!(!app.session().state().is_authenticated());
    assert_eq!(storage.get(SESSION_STORAGE_KEY).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn rejected_token_ends_the_session() {
    let storage = Arc::new(InMemoryStore::new());
    let authority = Arc::new(DemoRequestGateway::seeded().requiring_bearer());
    let app = app_with_authority(storage.clone(), authority.clone());
    app.start().await;
    app.login("admin@demo.com", "password").await.unwrap();
    app.refresh_requests().await.unwrap();

    authority.fail_next(GatewayError::Unauthorized);
    let err = app.refresh_requests().await.unwrap_err();

    assert_eq!(err, RequestError::Unauthorized);
    let session = app.session().state();
    assert!(!session.is_authenticated());
    assert!(session.last_error().is_some());
    assert_eq!(app.location(), Route::SignIn);
    assert!(!storage.contains(SESSION_STORAGE_KEY));
    assert!(app.requests().requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_relogin_drops_the_previous_authority_access() {
    let authority = Arc::new(DemoRequestGateway::seeded().requiring_bearer());
    let app = app_with_authority(Arc::new(InMemoryStore::new()), authority);
    app.start().await;
    app.login("admin@demo.com", "password").await.unwrap();
    assert_eq!(app.refresh_requests().await.unwrap().len(), 3);

    app.login("admin@demo.com", "bad").await.unwrap_err();

    assert!(!app.session().state().is_authenticated());
    assert!(app.requests().requests().is_empty());
    assert_eq!(app.refresh_requests().await.unwrap_err(), RequestError::Unauthorized);
    assert_eq!(app.open("/admin/requests"), View::Showing(Route::SignIn));
}

#[tokio::test(start_paused = true)]
async fn registration_joins_the_queue_as_pending() {
    let storage = Arc::new(InMemoryStore::new());
    let authority = Arc::new(DemoRequestGateway::seeded().requiring_bearer());
    let app = app_with_authority(storage, authority.clone());
    app.start().await;
    assert_eq!(app.open("/register"), View::Showing(Route::Register));

    let logo = LogoUpload::new("logo.png", "image/png", vec![0u8; 2048]);
    let receipt = app.register(registration("hi@downtowntyres.test", logo)).await.unwrap();
    assert_eq!(receipt.company_id, CompanyId::new("4"));
    assert_eq!(app.location(), Route::SignIn);
    assert_eq!(
        texts(&app),
        vec!["Registration successful. Your application is under review.".to_string()]
    );

    app.login("admin@demo.com", "password").await.unwrap();
    let requests = app.refresh_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
    assert!(requests[3].is_pending());
    assert_eq!(requests[3].company().name, "Downtown Tyres");
}

#[tokio::test(start_paused = true)]
async fn oversized_logo_is_refused_before_submission() {
    let authority = Arc::new(DemoRequestGateway::seeded());
    let app = app_with_authority(Arc::new(InMemoryStore::new()), authority.clone());

    let logo = LogoUpload::new("big.png", "image/png", vec![0u8; MAX_LOGO_BYTES + 1]);
    let err = app.register(registration("big@logo.test", logo)).await.unwrap_err();

    assert_eq!(err, GatewayError::Validation("Logo file size must be less than 5MB".into()));
    assert_eq!(texts(&app), vec!["Logo file size must be less than 5MB".to_string()]);
    assert_eq!(authority.records().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn non_image_logo_is_reported_once() {
    let authority = Arc::new(DemoRequestGateway::seeded());
    let app = app_with_authority(Arc::new(InMemoryStore::new()), authority.clone());

    let logo = LogoUpload::new("notes.txt", "text/plain", vec![0u8; 16]);
    let err = app.register(registration("txt@logo.test", logo)).await.unwrap_err();

    assert_eq!(err, GatewayError::Validation("Please upload an image file".into()));
    assert_eq!(texts(&app), vec!["Please upload an image file".to_string()]);
    assert_eq!(authority.records().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn sticky_notifications_outlive_the_clock() {
    let app = demo_app(Arc::new(InMemoryStore::new()));
    let id = app.notifications().show("Saved", Severity::Success, Duration::ZERO);

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(texts(&app), vec!["Saved".to_string()]);

    assert!(app.dismiss(id));
    assert!(!app.dismiss(id));
    assert!(app.notifications().is_empty());
}
