use anyhow::Result;
use docflow::utils::logging;
use docflow::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let _report = App::initialize(config).await?.run().await?;

    Ok(())
}
