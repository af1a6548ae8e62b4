use crate::calendar::{CalendarSource, GoogleCalendarSource, IcsCalendarSource};
use crate::config::{CalendarConfig, Config, ConfigError, Settings};
use crate::directory::Directory;
use crate::dispatch::{DispatchSettings, Dispatcher};
use crate::notifier::SlackNotifier;
use crate::render::{TemplateRef, TemplateRenderer};
use crate::scheduler::{Scheduler, SchedulerSettings};
use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;

/// How the process should run, from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Resolve the buddy once, print it and exit.
    pub once: bool,
    pub serve_status: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { once: false, serve_status: true }
    }
}

pub struct Application {
    config: Config,
    settings: Settings,
}

impl Application {
    /// Validates the configuration. Any error here is fatal: the scheduler
    /// must not start on a half-valid setup.
    pub fn new(config: Config) -> Result<Self> {
        let settings = config.validate().context("Invalid configuration")?;
        Ok(Self { config, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn calendar_source(&self) -> Result<Arc<dyn CalendarSource>> {
        match &self.config.calendar {
            CalendarConfig::Google { calendar_id, token_env } => {
                let token = self
                    .config
                    .calendar_token()?
                    .ok_or_else(|| ConfigError::MissingToken(token_env.clone()))?;
                let source =
                    GoogleCalendarSource::new(calendar_id.clone(), token, self.settings.call_timeout)
                        .context("Failed to set up the Google Calendar client")?;
                Ok(Arc::new(source))
            }
            CalendarConfig::Ics { path } => Ok(Arc::new(IcsCalendarSource::new(path.clone()))),
        }
    }

    /// Wires the dispatcher. Without `notify`, no notifier is attached even
    /// when a webhook is configured.
    pub fn build_dispatcher(&self, notify: bool) -> Result<Dispatcher> {
        let source = self.calendar_source()?;
        let directory = Directory::new(self.config.buddies.iter());
        if directory.is_empty() {
            warn!("The buddies list is empty, no contact will ever be resolved");
        }

        let settings = DispatchSettings {
            timezone: self.settings.timezone,
            watch_interval: self.settings.watch_interval,
            call_timeout: self.settings.call_timeout,
            channel: self.settings.channel.clone(),
        };
        let mut dispatcher = Dispatcher::new(source, directory, settings);

        match self.config.slack_webhook() {
            Some(webhook) if notify => {
                let notifier = SlackNotifier::new(vec![webhook], self.settings.call_timeout)
                    .context("Failed to set up the Slack client")?;
                dispatcher = dispatcher.with_notifier(Arc::new(notifier));
            }
            Some(_) => {}
            None => warn!("Slack webhook URL is not set, notifications are disabled"),
        }

        if let Some(artifact) = &self.config.artifact {
            let template =
                TemplateRef { template: artifact.template.clone(), output: artifact.output.clone() };
            dispatcher = dispatcher.with_renderer(Arc::new(TemplateRenderer), template);
        }

        Ok(dispatcher)
    }

    pub async fn run(&self, options: RunOptions) -> Result<()> {
        if options.once {
            let mut dispatcher = self.build_dispatcher(false)?;
            let outcome = dispatcher.run_watch_cycle(Utc::now()).await;
            println!("{}", serde_json::to_string_pretty(&outcome.buddy)?);
            return Ok(());
        }

        let dispatcher = self.build_dispatcher(true)?;

        // Bind before scheduling so a taken port stops the process up front.
        let api_handle = match self.settings.listen.filter(|_| options.serve_status) {
            Some(addr) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .with_context(|| format!("Failed to bind status endpoint to {}", addr))?;
                let reader = dispatcher.reader();
                Some(tokio::spawn(async move {
                    if let Err(e) = crate::api_server::serve(listener, reader).await {
                        error!("Status server error: {:?}", e);
                    }
                }))
            }
            None => {
                info!("Status endpoint disabled");
                None
            }
        };

        let scheduler = Scheduler::new(
            dispatcher,
            SchedulerSettings {
                watch_interval: self.settings.watch_interval,
                notify_interval: self.settings.notify_interval,
                run_at_startup: self.settings.check_at_startup,
            },
        );
        scheduler.run_until(shutdown_signal()).await;

        if let Some(handle) = api_handle {
            handle.abort();
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            error!("Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
