//! Sync repository guarantees backed by `PostgreSQL`.

use std::sync::Arc;

use crate::postgres::helpers::{TestDatabase, test_runtime};
use chrono::Utc;
use eyre::{Result, ensure, eyre};
use mockable::DefaultClock;
use pg_embedded_setup_unpriv::{TestCluster, test_support::shared_test_cluster};
use plansync::planning::domain::{EntityRef, EpicId, UserId};
use plansync::sync::{
    adapters::{cipher::ChaChaCredentialCipher, postgres::PostgresSyncRepository},
    domain::{
        AccessToken, ConnectionStatus, ContentHash, ExternalPushMapping, MappingKey, Provider,
        PushRun, PushRunId, PushScope, RefreshToken,
    },
    ports::{
        CredentialCipher, IntegrationRepository, MappingRepository, MappingRepositoryError,
        PushRunRepository, PushRunRepositoryError,
    },
    services::{ConnectRequest, IntegrationService, ProviderRegistry},
};
use rstest::rstest;

fn hash(fill: char) -> ContentHash {
    ContentHash::new(fill.to_string().repeat(64))
}

fn mapping(key: MappingKey, external_key: &str, pushed: &ContentHash) -> ExternalPushMapping {
    ExternalPushMapping {
        key,
        external_id: "10001".to_owned(),
        external_key: Some(external_key.to_owned()),
        external_url: Some(format!("https://tracker.example/browse/{external_key}")),
        last_pushed_at: Utc::now(),
        last_push_hash: pushed.clone(),
    }
}

#[rstest]
fn mapping_writes_compare_the_stored_hash(
    shared_test_cluster: &'static TestCluster,
) -> Result<()> {
    let db = TestDatabase::create(shared_test_cluster, "mapping_cas")?;
    let repo = PostgresSyncRepository::new(db.pool(2)?);
    let rt = test_runtime()?;

    rt.block_on(async {
        let key = MappingKey::new(
            UserId::new(),
            Provider::Jira,
            EntityRef::epic(EpicId::new()),
        );
        let first = mapping(key, "PLAN-1", &hash('a'));
        repo.upsert_if(&first, None).await?;

        let duplicate = repo.upsert_if(&mapping(key, "PLAN-2", &hash('b')), None).await;
        ensure!(
            matches!(duplicate, Err(MappingRepositoryError::Conflict(conflict)) if conflict == key),
            "second insert was not a conflict: {duplicate:?}"
        );

        let stale = repo
            .upsert_if(&mapping(key, "PLAN-3", &hash('c')), Some(&hash('z')))
            .await;
        ensure!(matches!(stale, Err(MappingRepositoryError::Conflict(_))));
        let stored = MappingRepository::find(&repo, &key)
            .await?
            .ok_or_else(|| eyre!("mapping missing"))?;
        ensure!(stored.external_key.as_deref() == Some("PLAN-1"));
        ensure!(stored.last_push_hash == hash('a'));

        repo.upsert_if(&mapping(key, "PLAN-1", &hash('d')), Some(&hash('a')))
            .await?;
        let updated = MappingRepository::find(&repo, &key)
            .await?
            .ok_or_else(|| eyre!("mapping missing"))?;
        ensure!(updated.last_push_hash == hash('d'));
        let listed = MappingRepository::list(&repo, key.user_id, Provider::Jira).await?;
        ensure!(listed.len() == 1);
        Ok::<_, eyre::Report>(())
    })
}

#[rstest]
fn finishing_a_run_twice_is_rejected(shared_test_cluster: &'static TestCluster) -> Result<()> {
    let db = TestDatabase::create(shared_test_cluster, "run_finish")?;
    let repo = PostgresSyncRepository::new(db.pool(2)?);
    let rt = test_runtime()?;

    rt.block_on(async {
        let mut run = PushRun::start(
            UserId::new(),
            Provider::Jira,
            EpicId::new(),
            PushScope::EpicOnly,
            false,
            false,
            &DefaultClock,
        );
        repo.begin(&run).await?;
        run.finish(&DefaultClock);
        repo.finish(&run).await?;

        let again = repo.finish(&run).await;
        ensure!(
            matches!(again, Err(PushRunRepositoryError::AlreadyFinished(id)) if id == run.id),
            "second finish was accepted: {again:?}"
        );
        let stored = PushRunRepository::find(&repo, run.id)
            .await?
            .ok_or_else(|| eyre!("run missing"))?;
        ensure!(stored.is_finished());

        let mut unknown = run.clone();
        unknown.id = PushRunId::new();
        ensure!(matches!(
            repo.finish(&unknown).await,
            Err(PushRunRepositoryError::NotFound(id)) if id == unknown.id
        ));
        ensure!(matches!(
            repo.begin(&run).await,
            Err(PushRunRepositoryError::Duplicate(_))
        ));
        Ok::<_, eyre::Report>(())
    })
}

#[rstest]
fn stored_tokens_are_sealed_at_rest(shared_test_cluster: &'static TestCluster) -> Result<()> {
    let db = TestDatabase::create(shared_test_cluster, "sealed_tokens")?;
    let repo = Arc::new(PostgresSyncRepository::new(db.pool(2)?));
    let cipher = ChaChaCredentialCipher::from_secret("postgres suite secret");
    let service = IntegrationService::new(
        Arc::clone(&repo),
        Arc::new(cipher.clone()),
        ProviderRegistry::new(),
        Arc::new(DefaultClock),
    );
    let rt = test_runtime()?;

    rt.block_on(async {
        let user = UserId::new();
        service
            .connect(
                user,
                Provider::Linear,
                ConnectRequest {
                    access_token: AccessToken::new("lin_api_secret"),
                    refresh_token: Some(RefreshToken::new("lin_refresh_secret")),
                    expires_at: None,
                },
            )
            .await?;

        let stored = IntegrationRepository::find(repo.as_ref(), user, Provider::Linear)
            .await?
            .ok_or_else(|| eyre!("integration missing"))?;
        ensure!(stored.status() == ConnectionStatus::Connected);
        let credentials = stored.connected_credentials()?;
        let sealed = credentials.access_token();
        ensure!(
            !sealed
                .as_bytes()
                .windows(b"lin_api_secret".len())
                .any(|window| window == b"lin_api_secret")
        );
        ensure!(cipher.decrypt(sealed)? == "lin_api_secret");
        let refresh = credentials
            .refresh_token()
            .ok_or_else(|| eyre!("refresh token missing"))?;
        ensure!(cipher.decrypt(refresh)? == "lin_refresh_secret");

        let other = ChaChaCredentialCipher::from_secret("rotated secret");
        ensure!(other.decrypt(sealed).is_err());
        Ok::<_, eyre::Report>(())
    })
}
