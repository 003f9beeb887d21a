mod common;

use std::io;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use common::{affiliate_draft, TestApp};
use coupon_admin::{
    config::AppConfig,
    errors::ServiceError,
    models::{PayoutMethod, Role, UserDraft},
};

#[tokio::test]
async fn created_affiliates_get_unique_prefixed_codes() {
    let app = TestApp::new();
    let mut codes = Vec::new();
    for seq in 0..20 {
        let affiliate = app.affiliate(seq).await;
        assert!(affiliate.internal_code.starts_with("AFF"));
        assert_eq!(affiliate.internal_code.len(), 9);
        codes.push(affiliate.internal_code);
    }
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 20);
}

#[tokio::test]
async fn configured_prefix_is_used() {
    let app = TestApp::with_config(AppConfig {
        affiliate_code_prefix: "PRT".to_string(),
        ..AppConfig::default()
    });
    let affiliate = app.affiliate(1).await;
    assert!(affiliate.internal_code.starts_with("PRT"));

    let found = app
        .state
        .affiliates
        .get_by_internal_code(&affiliate.internal_code.to_lowercase())
        .await
        .unwrap();
    assert_eq!(found.id, affiliate.id);
}

#[tokio::test]
async fn email_and_cpf_must_be_unique() {
    let app = TestApp::new();
    app.affiliate(1).await;

    let mut same_email = affiliate_draft(2);
    same_email.email = "AFFILIATE1@example.com".to_string();
    assert_matches!(
        app.state.affiliates.create(same_email).await,
        Err(ServiceError::Conflict(_))
    );

    let mut same_cpf = affiliate_draft(3);
    same_cpf.cpf = common::cpf_for(1);
    assert_matches!(
        app.state.affiliates.create(same_cpf).await,
        Err(ServiceError::Conflict(_))
    );
}

#[tokio::test]
async fn update_keeps_internal_code_and_allows_own_email() {
    let app = TestApp::new();
    let affiliate = app.affiliate(1).await;

    let mut draft = affiliate_draft(1);
    draft.name = "Renamed Affiliate".to_string();
    let updated = app
        .state
        .affiliates
        .update(affiliate.id, draft)
        .await
        .unwrap();
    assert_eq!(updated.internal_code, affiliate.internal_code);
    assert_eq!(updated.name, "Renamed Affiliate");
    assert_eq!(updated.created_at, affiliate.created_at);
}

#[tokio::test]
async fn payout_and_cpf_are_validated() {
    let app = TestApp::new();

    let mut no_key = affiliate_draft(1);
    no_key.payout = PayoutMethod::Pix { key: String::new() };
    assert_matches!(
        app.state.affiliates.create(no_key).await,
        Err(ServiceError::ValidationError(_))
    );

    let mut bad_cpf = affiliate_draft(2);
    bad_cpf.cpf = "123".to_string();
    assert_matches!(
        app.state.affiliates.create(bad_cpf).await,
        Err(ServiceError::InvalidInput(_))
    );
}

#[tokio::test]
async fn search_matches_name_email_code_and_cpf() {
    let app = TestApp::new();
    let first = app.affiliate(1).await;
    app.affiliate(2).await;

    let by_name = app.state.affiliates.search("affiliate 1").await.unwrap();
    assert_eq!(by_name.len(), 1);

    let by_email = app.state.affiliates.search("AFFILIATE2@").await.unwrap();
    assert_eq!(by_email.len(), 1);

    let by_code = app
        .state
        .affiliates
        .search(&first.internal_code.to_lowercase())
        .await
        .unwrap();
    assert!(by_code.iter().any(|a| a.id == first.id));

    let by_cpf = app.state.affiliates.search("000.000.00").await.unwrap();
    assert_eq!(by_cpf.len(), 2);

    assert_eq!(app.state.affiliates.search("  ").await.unwrap().len(), 2);
}

#[tokio::test]
async fn delete_removes_affiliate() {
    let app = TestApp::new();
    let affiliate = app.affiliate(1).await;
    app.state.affiliates.delete(affiliate.id).await.unwrap();
    assert_matches!(
        app.state.affiliates.get(affiliate.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.state.affiliates.delete(affiliate.id).await,
        Err(ServiceError::NotFound(_))
    );
}

fn user_draft(email: &str) -> UserDraft {
    UserDraft {
        name: "Operator".to_string(),
        email: email.to_string(),
        cpf: "529.982.247-25".to_string(),
        phone: String::new(),
        role: Role::Hub,
    }
}

#[tokio::test]
async fn user_search_matches_name_email_and_cpf() {
    let app = TestApp::new();
    let mut maria = user_draft("maria@example.com");
    maria.name = "Maria Souza".to_string();
    let maria = app.state.users.create(maria).await.unwrap();
    let mut joao = user_draft("joao@example.org");
    joao.name = "Joao Lima".to_string();
    joao.cpf = "111.444.777-35".to_string();
    app.state.users.create(joao).await.unwrap();

    let by_name = app.state.users.search("souza").await.unwrap();
    assert_eq!(by_name.iter().map(|u| u.id).collect::<Vec<_>>(), vec![maria.id]);

    let by_email = app.state.users.search("EXAMPLE.ORG").await.unwrap();
    assert_eq!(by_email.len(), 1);
    assert_eq!(by_email[0].name, "Joao Lima");

    let by_cpf = app.state.users.search("982.247").await.unwrap();
    assert_eq!(by_cpf.len(), 1);
    assert_eq!(by_cpf[0].id, maria.id);

    assert!(app.state.users.search("pedro").await.unwrap().is_empty());
    assert_eq!(app.state.users.search("").await.unwrap().len(), 2);
}

#[tokio::test]
async fn principal_admin_cannot_be_deleted() {
    let app = TestApp::new();
    let mut admin = user_draft("Admin@Example.com");
    admin.role = Role::Admin;
    let admin = app.state.users.create(admin).await.unwrap();

    assert_matches!(
        app.state.users.delete(admin.id).await,
        Err(ServiceError::Conflict(_))
    );
    assert_eq!(app.state.users.get(admin.id).await.unwrap(), admin);

    let other = app
        .state
        .users
        .create(user_draft("second-admin@example.com"))
        .await
        .unwrap();
    app.state.users.delete(other.id).await.unwrap();
    assert_matches!(
        app.state.users.delete(other.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn blank_protected_admin_allows_deletion() {
    let app = TestApp::with_config(AppConfig {
        protected_admin_email: Some(String::new()),
        ..AppConfig::default()
    });
    let admin = app
        .state
        .users
        .create(user_draft("admin@example.com"))
        .await
        .unwrap();
    app.state.users.delete(admin.id).await.unwrap();
    assert!(app.state.users.list().await.unwrap().is_empty());
}

/// In-memory log sink for the fmt subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn service_logs_do_not_carry_email_addresses() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = TestApp::new();
    let affiliate = app.affiliate(7).await;
    app.state
        .affiliates
        .update(affiliate.id, affiliate_draft(7))
        .await
        .unwrap();
    app.state
        .affiliates
        .search("affiliate7@example.com")
        .await
        .unwrap();
    let user = app
        .state
        .users
        .create(user_draft("ops@example.com"))
        .await
        .unwrap();
    app.state.users.search("ops@example.com").await.unwrap();

    let captured = logs.contents();
    assert!(captured.contains("Affiliate created"));
    assert!(captured.contains(&user.id.to_string()));
    assert!(!captured.contains("@example.com"));
}

#[tokio::test]
async fn user_emails_are_unique_case_insensitively() {
    let app = TestApp::new();
    let user = app
        .state
        .users
        .create(user_draft("ops@example.com"))
        .await
        .unwrap();
    assert_eq!(user.role, Role::Hub);

    assert_matches!(
        app.state.users.create(user_draft("OPS@example.com")).await,
        Err(ServiceError::Conflict(_))
    );

    let mut promoted = user_draft("ops@example.com");
    promoted.role = Role::Admin;
    let updated = app.state.users.update(user.id, promoted).await.unwrap();
    assert_eq!(updated.role, Role::Admin);

    app.state.users.delete(user.id).await.unwrap();
    assert!(app.state.users.list().await.unwrap().is_empty());
}
