use promo_server::core::{AppContext, BackgroundTasks, Config, TaskKind};
use promo_server::reservation::{ExpirySweeper, ReleaseConsumer};
use promo_server::{init_logger, print_banner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 设置环境 (dotenv, 日志)
    dotenv::dotenv().ok();
    init_logger();

    // 打印横幅
    print_banner();

    tracing::info!("Promo Server starting...");

    // 2. 加载配置
    let config = Config::from_env();

    // 3. 装配上下文 (数据库、锁存储、认证、引擎、延迟队列)
    let (context, release_rx) = AppContext::initialize(config).await?;

    // 4. 启动后台任务 (释放队列消费者 + 到期兜底扫描)
    let mut tasks = BackgroundTasks::new();

    let consumer = ReleaseConsumer::new(
        context.coupon_engine.clone(),
        context.stock_engine.clone(),
        context.broker.clone(),
        tasks.shutdown_token(),
    );
    tasks.spawn("release_consumer", TaskKind::Worker, async move {
        consumer.run(release_rx).await;
    });

    let sweeper = ExpirySweeper::new(
        vec![context.coupon_engine.clone(), context.stock_engine.clone()],
        std::time::Duration::from_secs(context.config.sweep_interval_secs),
        tasks.shutdown_token(),
    );
    tasks.spawn("expiry_sweeper", TaskKind::Periodic, async move {
        sweeper.run().await;
    });

    tasks.log_summary();
    tracing::info!("Promo Server ready");

    // 5. 等待退出信号，优雅关闭
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    context.broker.close();
    tasks.shutdown().await;

    Ok(())
}
