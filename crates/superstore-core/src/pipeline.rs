//! Sequential driver: wait, provision, load, normalize, index, view, verify.

use sqlx::postgres::PgConnection;
use tracing::{info, warn};

use crate::config::EtlConfig;
use crate::db;
use crate::error::{Result, Stage};
use crate::load;
use crate::normalize;
use crate::provision;
use crate::report;
use crate::verify::{self, RunSummary};
use crate::wait;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Assume the server is already reachable.
    pub skip_wait: bool,
}

/// Everything one run owns. The target connection is opened on first use
/// and must be released with [`PipelineContext::close`].
pub struct PipelineContext {
    config: EtlConfig,
    conn: Option<PgConnection>,
}

impl PipelineContext {
    pub fn new(config: EtlConfig) -> Self {
        Self { config, conn: None }
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Connection to the target database, opened lazily.
    pub async fn target(&mut self) -> Result<&mut PgConnection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => db::connect_target(&self.config).await?,
        };
        Ok(self.conn.insert(conn))
    }

    pub async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            db::close_quietly(conn, self.config.target_database.as_str()).await;
            info!("Connection closed");
        }
    }
}

impl Drop for PipelineContext {
    fn drop(&mut self) {
        if self.conn.is_some() {
            warn!("pipeline context dropped with an open connection; closing without goodbye");
        }
    }
}

/// Runs the full pipeline. The target connection is closed before this
/// returns, whether the run succeeded or not.
pub async fn run(config: EtlConfig, options: RunOptions) -> Result<RunSummary> {
    let mut ctx = PipelineContext::new(config);
    let result = run_stages(&mut ctx, options).await;
    ctx.close().await;
    if let Err(err) = &result {
        warn!(stage = %err.stage(), step = err.step().unwrap_or("-"), "Run aborted: {err}");
    }
    result
}

async fn run_stages(ctx: &mut PipelineContext, options: RunOptions) -> Result<RunSummary> {
    let wait_attempts = if options.skip_wait {
        None
    } else {
        let attempts = wait::wait_for_database(ctx.config()).await?;
        stage_done(Stage::Wait);
        Some(attempts)
    };

    provision::provision_database(ctx.config()).await?;
    stage_done(Stage::Provision);

    let csv_path = ctx.config().csv_path.clone();
    let database = ctx.config().target_database.to_string();
    let conn = ctx.target().await?;

    let load_report = load::load_staging(conn, &csv_path).await?;
    stage_done(Stage::Load);

    normalize::normalize(conn).await?;
    stage_done(Stage::Normalize);

    report::create_indexes(conn).await?;
    stage_done(Stage::Index);

    report::create_customer_category_view(conn).await?;
    stage_done(Stage::View);

    let summary = verify::verify(conn, &database, wait_attempts, &load_report).await?;
    stage_done(Stage::Verify);

    Ok(summary)
}

fn stage_done(stage: Stage) {
    info!(stage = %stage, "Stage complete");
}
