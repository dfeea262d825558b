//! # Record Service
//!
//! Composes the record store with the auth backend and applies the batch
//! rules:
//!
//! - multi-id lookups run one id at a time, in request order, and stop at the
//!   first failing id; nothing collected so far is returned
//! - batch inserts run one record at a time and stop at the first failure;
//!   rows already inserted stay (no transaction)

use std::sync::Arc;

use tracing::Instrument;

use crate::auth::AuthClient;
use crate::data::RecordStore;
use crate::entity::Record;
use crate::errors::{AppError, AppResult, ErrorKind};
use crate::observability::TraceContext;

/// Service-layer orchestrator
#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    auth: Arc<dyn AuthClient>,
}

impl RecordService {
    pub fn new(store: Arc<dyn RecordStore>, auth: Arc<dyn AuthClient>) -> Self {
        Self { store, auth }
    }

    /// Check `token` against feature `code`.
    ///
    /// A backend that cannot be reached is an internal error; a backend that
    /// says no is unauthorized, unless it reports its own 5xx.
    pub async fn authorize(&self, ctx: &TraceContext, token: &str, code: &str) -> AppResult<()> {
        let ctx = ctx.child("Authorize");

        async {
            tracing::info!(code, "Check Auth");

            let verdict = self
                .auth
                .check_auth(&ctx, token, code)
                .await
                .map_err(|err| {
                    tracing::error!(error = %err, "Failed to check auth");
                    AppError::from(err).wrap("[SERVICE][Authorize]")
                })?;

            if verdict.is_denied() {
                tracing::error!(msg = %verdict.error.msg, code = verdict.error.code, "401 Unauthorized");
                let mut err =
                    AppError::unauthorized(format!("401 Unauthorized: {}", verdict.error.msg));
                if verdict.error.code >= 500 {
                    err = err.escalate(ErrorKind::Internal);
                }
                return Err(err.wrap("[SERVICE][Authorize]"));
            }

            tracing::info!("End Check Auth");
            Ok::<_, AppError>(())
        }
        .instrument(ctx.span().clone())
        .await
    }

    pub async fn lookup_by_name(&self, ctx: &TraceContext, name: &str) -> AppResult<Vec<Record>> {
        let ctx = ctx.child("LookupByName");

        self.store
            .lookup_by_name(&ctx, name)
            .instrument(ctx.span().clone())
            .await
            .map_err(|err| err.wrap("[SERVICE][LookupByName]"))
    }

    pub async fn lookup_by_city(&self, ctx: &TraceContext, city: &str) -> AppResult<Vec<Record>> {
        let ctx = ctx.child("LookupByCity");

        self.store
            .lookup_by_city(&ctx, city)
            .instrument(ctx.span().clone())
            .await
            .map_err(|err| err.wrap("[SERVICE][LookupByCity]"))
    }

    /// Fetch each id in order; the first failure is the whole result
    pub async fn lookup_by_many(&self, ctx: &TraceContext, ids: &[i64]) -> AppResult<Vec<Record>> {
        let ctx = ctx.child("LookupByMany");

        async {
            let mut records = Vec::with_capacity(ids.len());
            for &id in ids {
                let record = self
                    .store
                    .lookup_by_id(&ctx, id)
                    .await
                    .map_err(|err| err.wrap("[SERVICE][LookupByMany]"))?;
                records.push(record);
            }
            Ok::<_, AppError>(records)
        }
        .instrument(ctx.span().clone())
        .await
    }

    /// Insert each record in order, returning generated ids.
    ///
    /// Not atomic: on failure at record k, records before k remain inserted.
    pub async fn insert_many(&self, ctx: &TraceContext, records: &[Record]) -> AppResult<Vec<i64>> {
        let ctx = ctx.child("InsertMany");

        async {
            let mut ids = Vec::with_capacity(records.len());
            for (index, record) in records.iter().enumerate() {
                let id = self.store.insert(&ctx, record).await.map_err(|err| {
                    tracing::error!(index, inserted = ids.len(), "batch insert stopped");
                    err.wrap("[SERVICE][InsertMany]")
                })?;
                ids.push(id);
            }
            Ok::<_, AppError>(ids)
        }
        .instrument(ctx.span().clone())
        .await
    }

    /// Returns affected rows; zero when the id does not exist
    pub async fn update(&self, ctx: &TraceContext, record: &Record) -> AppResult<usize> {
        let ctx = ctx.child("Update");

        async {
            let affected = self
                .store
                .update(&ctx, record)
                .await
                .map_err(|err| err.wrap("[SERVICE][Update]"))?;

            if affected == 0 {
                tracing::warn!(user_id = ?record.id, "update matched no rows");
            }
            Ok::<_, AppError>(affected)
        }
        .instrument(ctx.span().clone())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::auth::{AuthError, AuthResult, Authorization};

    /// Vec-backed store; ids are 1-based positions. Names in `reject` fail on insert.
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<Record>>,
        reject: Vec<&'static str>,
        lookups: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn lookup_by_name(&self, _: &TraceContext, name: &str) -> AppResult<Vec<Record>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().filter(|r| r.name == name).cloned().collect())
        }

        async fn lookup_by_city(&self, _: &TraceContext, city: &str) -> AppResult<Vec<Record>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().filter(|r| r.city == city).cloned().collect())
        }

        async fn lookup_by_id(&self, _: &TraceContext, id: i64) -> AppResult<Record> {
            self.lookups.lock().unwrap().push(id);
            let rows = self.rows.lock().unwrap();
            rows.iter()
                .find(|r| r.id == Some(id))
                .cloned()
                .ok_or_else(|| AppError::not_found("no rows").wrap("[DATA][LookupByID]"))
        }

        async fn insert(&self, _: &TraceContext, record: &Record) -> AppResult<i64> {
            if self.reject.contains(&record.name.as_str()) {
                return Err(AppError::not_found("constraint failed").wrap("[DATA][Insert]"));
            }
            let mut rows = self.rows.lock().unwrap();
            let id = rows.len() as i64 + 1;
            rows.push(record.clone().with_id(id));
            Ok(id)
        }

        async fn update(&self, _: &TraceContext, record: &Record) -> AppResult<usize> {
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(row) => {
                    *row = record.clone();
                    Ok(1)
                }
                None => Ok(0),
            }
        }
    }

    enum Verdict {
        Grant,
        Deny(i64),
        Unreachable,
    }

    struct FixedAuth(Verdict);

    #[async_trait]
    impl AuthClient for FixedAuth {
        async fn check_auth(&self, _: &TraceContext, _: &str, _: &str) -> AuthResult<Authorization> {
            match self.0 {
                Verdict::Grant => Ok(Authorization::granted()),
                Verdict::Deny(code) => Ok(Authorization::denied(code, "denied")),
                Verdict::Unreachable => Err(AuthError::UnexpectedStatus(503)),
            }
        }
    }

    fn service(store: Arc<MemoryStore>, verdict: Verdict) -> RecordService {
        RecordService::new(store, Arc::new(FixedAuth(verdict)))
    }

    fn seeded() -> Arc<MemoryStore> {
        let rows = [("Alice", 30, "Jakarta"), ("Budi", 41, "Bandung"), ("Alice", 22, "Bogor")]
            .into_iter()
            .zip(1..)
            .map(|((name, age, city), id)| Record::new(name, age, city).with_id(id))
            .collect();

        Arc::new(MemoryStore {
            rows: Mutex::new(rows),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_lookup_by_many_in_order() {
        let svc = service(seeded(), Verdict::Grant);
        let records = svc.lookup_by_many(&TraceContext::root(), &[3, 1]).await.unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![Some(3), Some(1)]);
    }

    #[tokio::test]
    async fn test_lookup_by_many_stops_at_first_failure() {
        let store = seeded();
        let svc = service(store.clone(), Verdict::Grant);

        let err = svc
            .lookup_by_many(&TraceContext::root(), &[1, 99, 2])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.layers(),
            ["[SERVICE][LookupByMany]", "[DATA][LookupByID]"]
        );
        // id 2 is never requested
        assert_eq!(*store.lookups.lock().unwrap(), vec![1, 99]);
    }

    #[tokio::test]
    async fn test_lookup_by_many_empty() {
        let svc = service(seeded(), Verdict::Grant);
        assert!(svc.lookup_by_many(&TraceContext::root(), &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_many_keeps_rows_before_failure() {
        let store = Arc::new(MemoryStore {
            reject: vec!["bad"],
            ..Default::default()
        });
        let svc = service(store.clone(), Verdict::Grant);

        let batch = [
            Record::new("a", 1, "X"),
            Record::new("b", 2, "X"),
            Record::new("bad", 3, "X"),
            Record::new("d", 4, "X"),
        ];
        let err = svc.insert_many(&TraceContext::root(), &batch).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_many_returns_ids() {
        let svc = service(Arc::new(MemoryStore::default()), Verdict::Grant);
        let ids = svc
            .insert_many(
                &TraceContext::root(),
                &[Record::new("a", 1, "X"), Record::new("b", 2, "Y")],
            )
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_update_missing_id_is_success() {
        let svc = service(seeded(), Verdict::Grant);
        let affected = svc
            .update(&TraceContext::root(), &Record::new("Z", 1, "Q").with_id(500))
            .await
            .unwrap();
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn test_lookup_passthrough_wraps_errors() {
        struct Broken;
        #[async_trait]
        impl RecordStore for Broken {
            async fn lookup_by_name(&self, _: &TraceContext, _: &str) -> AppResult<Vec<Record>> {
                Err(AppError::not_found("disk I/O error").wrap("[DATA][LookupByName]"))
            }
            async fn lookup_by_city(&self, _: &TraceContext, _: &str) -> AppResult<Vec<Record>> {
                Ok(Vec::new())
            }
            async fn lookup_by_id(&self, _: &TraceContext, _: i64) -> AppResult<Record> {
                unreachable!()
            }
            async fn insert(&self, _: &TraceContext, _: &Record) -> AppResult<i64> {
                unreachable!()
            }
            async fn update(&self, _: &TraceContext, _: &Record) -> AppResult<usize> {
                unreachable!()
            }
        }

        let svc = RecordService::new(Arc::new(Broken), Arc::new(FixedAuth(Verdict::Grant)));
        let err = svc.lookup_by_name(&TraceContext::root(), "x").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "[SERVICE][LookupByName]: [DATA][LookupByName]: disk I/O error"
        );
    }

    #[tokio::test]
    async fn test_authorize_granted() {
        let svc = service(seeded(), Verdict::Grant);
        assert!(svc.authorize(&TraceContext::root(), "Token t", "191").await.is_ok());
    }

    #[tokio::test]
    async fn test_authorize_denied_is_unauthorized() {
        let svc = service(seeded(), Verdict::Deny(401));
        let err = svc
            .authorize(&TraceContext::root(), "Token t", "191")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_authorize_denied_with_backend_fault_is_internal() {
        let svc = service(seeded(), Verdict::Deny(500));
        let err = svc
            .authorize(&TraceContext::root(), "Token t", "191")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_authorize_transport_failure_is_internal() {
        let svc = service(seeded(), Verdict::Unreachable);
        let err = svc
            .authorize(&TraceContext::root(), "Token t", "191")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.layers(), ["[SERVICE][Authorize]"]);
    }
}
