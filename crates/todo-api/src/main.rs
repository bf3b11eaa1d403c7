//! todo-api バイナリのエントリポイント

use anyhow::Context;
use shared::{init_tracing, Config};
use todo_api::{app, AppState};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("設定の読み込みに失敗しました")?;

    init_tracing(config.json_logs)
        .map_err(|e| anyhow::anyhow!("トレーシングの初期化に失敗しました: {e}"))?;

    info!(
        environment = %config.environment,
        backend = %config.storage.backend,
        "todo-api 起動"
    );

    // バックエンドは起動時に一度だけ選択する
    let store = infrastructure::connect(&config.storage).context("ストレージの初期化に失敗しました")?;
    let router = app(AppState::new(store));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("todo-api 停止");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C ハンドラを登録できませんでした");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM ハンドラを登録できませんでした");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl+C を受信、シャットダウンします"),
        () = terminate => info!("SIGTERM を受信、シャットダウンします"),
    }
}
