use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{error, warn};

/// Cooperative stop flag checked by workers between items
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Trigger on the first Ctrl-C; exit the process on the second.
    ///
    /// The listener runs a current-thread tokio runtime on a dedicated thread.
    pub fn install_ctrl_c_handler(&self) -> Result<()> {
        let signal = self.clone();
        thread::Builder::new()
            .name("signal".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start signal listener: {}", e);
                        return;
                    }
                };

                runtime.block_on(async move {
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                    warn!("Interrupt received, workers will stop after their current item");
                    signal.trigger();

                    if tokio::signal::ctrl_c().await.is_ok() {
                        error!("Second interrupt received, exiting immediately");
                        std::process::exit(130);
                    }
                });
            })?;
        Ok(())
    }
}
