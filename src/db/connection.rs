use crate::config::MySqlAuthConfig;
use crate::db::schema::Statements;
use crate::error::SessionError;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Default)]
struct ConnState {
    pool: Option<MySqlPool>,
    bootstrapped: bool,
}

impl ConnState {
    fn plan(&self, force: bool) -> ConnPlan {
        let live = self.pool.as_ref().is_some_and(|p| !p.is_closed());
        ConnPlan::new(live, self.bootstrapped, force)
    }
}

/// What a `connection` call has to do before handing out the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConnPlan {
    reopen: bool,
    bootstrap: bool,
}

impl ConnPlan {
    fn new(live: bool, bootstrapped: bool, force: bool) -> Self {
        Self {
            reopen: force || !live,
            bootstrap: !bootstrapped,
        }
    }
}

/// Owns the database handle shared by every session store built on it.
///
/// The handle is created lazily on first use, reused while it stays open and
/// replaced when it is found closed or when the caller forces it. The table is
/// bootstrapped once per connector; a failed bootstrap is attempted again on
/// the next call.
pub struct Connector {
    config: MySqlAuthConfig,
    statements: Statements,
    state: Mutex<ConnState>,
}

impl Connector {
    pub fn new(config: MySqlAuthConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let statements = Statements::for_table(&config.table_name);
        Ok(Self {
            config,
            statements,
            state: Mutex::new(ConnState::default()),
        })
    }

    pub fn config(&self) -> &MySqlAuthConfig {
        &self.config
    }

    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    /// Live handle, creating or replacing it when needed.
    pub async fn connection(&self, force: bool) -> Result<MySqlPool, SessionError> {
        let mut state = self.state.lock().await;
        let plan = state.plan(force);

        let pool = match state.pool.as_ref() {
            Some(pool) if !plan.reopen => pool.clone(),
            _ => {
                let pool = self.open().await?;
                if let Some(old) = state.pool.replace(pool.clone()) {
                    info!(force, "reconnected to MySQL");
                    // Checked-out connections may still be in use; don't wait on them here.
                    tokio::spawn(async move { old.close().await });
                }
                pool
            }
        };

        if plan.bootstrap {
            self.bootstrap(&pool).await?;
            state.bootstrapped = true;
        }
        Ok(pool)
    }

    /// Close the current handle, if any. The next `connection` call reopens.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(pool) = state.pool.take() {
            pool.close().await;
            debug!("MySQL handle closed");
        }
    }

    fn connect_options(&self) -> Result<MySqlConnectOptions, SessionError> {
        let cfg = &self.config;

        let mut opts = match cfg.url.as_ref() {
            Some(url) => MySqlConnectOptions::from_str(url.as_str())?,
            None => {
                let mut opts = MySqlConnectOptions::new()
                    .host(&cfg.host)
                    .port(cfg.port)
                    .username(&cfg.user)
                    .database(&cfg.database);
                if let Some(password) = cfg.password.as_deref() {
                    opts = opts.password(password);
                }
                opts
            }
        };

        if let Some(socket) = cfg.socket_path.as_ref() {
            opts = opts.socket(socket);
        }

        opts = opts.ssl_mode(cfg.tls.mode.into());
        if let Some(ca) = cfg.tls.ca.as_ref() {
            opts = opts.ssl_ca(ca);
        }
        if let Some(cert) = cfg.tls.cert.as_ref() {
            opts = opts.ssl_client_cert(cert);
        }
        if let Some(key) = cfg.tls.key.as_ref() {
            opts = opts.ssl_client_key(key);
        }

        Ok(opts)
    }

    async fn open(&self) -> Result<MySqlPool, SessionError> {
        let cfg = &self.config;
        let ignored = cfg.unsupported_options();
        if !ignored.is_empty() {
            warn!(options = ?ignored, "MySQL driver does not support these options; ignoring");
        }

        let opts = self.connect_options()?;
        // Keep-alive: ping the connection before handing it out.
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(cfg.connect_timeout())
            .test_before_acquire(cfg.keep_alive)
            .connect_with(opts)
            .await?;

        info!(
            host = %cfg.host,
            port = cfg.port,
            database = %cfg.database,
            "connected to MySQL"
        );
        Ok(pool)
    }

    async fn bootstrap(&self, pool: &MySqlPool) -> Result<(), SessionError> {
        sqlx::query(&self.statements.create_table)
            .execute(pool)
            .await?;
        info!(table = %self.statements.table, "session table ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsMode;
    use url::Url;

    #[test]
    fn rejects_invalid_config_up_front() {
        assert!(Connector::new(MySqlAuthConfig::default()).is_err());
    }

    #[test]
    fn renders_statements_for_the_configured_table() {
        let mut cfg = MySqlAuthConfig::new("main");
        cfg.table_name = "wa_auth".to_string();
        let connector = Connector::new(cfg).unwrap();
        assert_eq!(connector.statements().table, "wa_auth");
        assert!(connector.statements().create_table.contains("`wa_auth`"));
    }

    #[test]
    fn builds_options_from_discrete_fields_or_url() {
        let mut cfg = MySqlAuthConfig::new("main");
        cfg.host = "db.internal".to_string();
        cfg.port = 3307;
        cfg.password = Some("secret".to_string());
        cfg.tls.mode = TlsMode::Disabled;
        let opts = Connector::new(cfg.clone()).unwrap().connect_options().unwrap();
        assert_eq!(opts.get_host(), "db.internal");
        assert_eq!(opts.get_port(), 3307);
        assert_eq!(opts.get_database(), Some("base"));

        cfg.url = Some(Url::parse("mysql://app:pw@other-host:3310/auth").unwrap());
        let opts = Connector::new(cfg).unwrap().connect_options().unwrap();
        assert_eq!(opts.get_host(), "other-host");
        assert_eq!(opts.get_port(), 3310);
        assert_eq!(opts.get_username(), "app");
        assert_eq!(opts.get_database(), Some("auth"));
    }

    fn plan(reopen: bool, bootstrap: bool) -> ConnPlan {
        ConnPlan { reopen, bootstrap }
    }

    #[test]
    fn first_call_opens_and_bootstraps() {
        assert_eq!(ConnPlan::new(false, false, false), plan(true, true));
    }

    #[test]
    fn bootstrapped_live_handle_is_reused_as_is() {
        assert_eq!(ConnPlan::new(true, true, false), plan(false, false));
    }

    #[test]
    fn forced_or_closed_handle_reopens_without_bootstrapping_again() {
        assert_eq!(ConnPlan::new(true, true, true), plan(true, false));
        assert_eq!(ConnPlan::new(false, true, false), plan(true, false));
    }

    #[test]
    fn failed_bootstrap_is_retried_on_the_saved_handle() {
        assert_eq!(ConnPlan::new(true, false, false), plan(false, true));
        assert_eq!(ConnPlan::new(true, false, true), plan(true, true));
    }

    #[tokio::test]
    async fn state_plans_from_the_pool_it_holds() {
        let cfg = MySqlAuthConfig::new("main");
        let opts = Connector::new(cfg).unwrap().connect_options().unwrap();
        let pool = MySqlPoolOptions::new().connect_lazy_with(opts);

        // Handle saved but the table never created.
        let mut state = ConnState {
            pool: Some(pool.clone()),
            bootstrapped: false,
        };
        assert_eq!(state.plan(false), plan(false, true));

        state.bootstrapped = true;
        assert_eq!(state.plan(false), plan(false, false));

        pool.close().await;
        assert_eq!(state.plan(false), plan(true, false));
        assert_eq!(ConnState::default().plan(false), plan(true, true));
    }

    #[tokio::test]
    async fn close_without_a_handle_is_a_no_op() {
        let connector = Connector::new(MySqlAuthConfig::new("main")).unwrap();
        connector.close().await;
    }
}
