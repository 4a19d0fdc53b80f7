use dropsync_lib::logging::{self, LogConfig};
use lambda_runtime::{run, service_fn, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _guard = logging::init(&LogConfig::from_env());

    run(service_fn(dropsync_lib::lambda_handler)).await
}
