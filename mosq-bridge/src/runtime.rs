use log::LevelFilter;
use once_cell::sync::OnceCell;

use crate::broker::Broker;
use crate::directory::Directory;
use crate::error::FatalError;
use crate::logger::logger_init;
use crate::options::PluginOptions;
use crate::script::Script;
use crate::settings::Settings;
use crate::types::StatusCode;

/// Process-wide pairing of a script with the broker it runs in.
///
/// One `Bridge` serves every plugin instance the broker loads from the same library; it lives
/// until the process exits.
pub struct Bridge<S: Script> {
    script: S,
    broker: Box<dyn Broker>,
    //log level in effect since the start
    started: OnceCell<LevelFilter>,
}

impl<S: Script> Bridge<S> {
    #[inline]
    pub fn new(script: S, broker: Box<dyn Broker>) -> Self {
        Self { script, broker, started: OnceCell::new() }
    }

    #[inline]
    pub fn script(&self) -> &S {
        &self.script
    }

    #[inline]
    pub fn broker(&self) -> &dyn Broker {
        self.broker.as_ref()
    }

    #[inline]
    pub fn directory(&'static self) -> Directory<'static> {
        Directory::new(self.broker.as_ref())
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started.get().is_some()
    }

    /// Level the broker log backend was installed with, once started.
    #[inline]
    pub fn log_level(&self) -> Option<LevelFilter> {
        self.started.get().copied()
    }

    /// Starts the script runtime on first call; later and concurrent calls wait for that start and
    /// then return. A failed start leaves the runtime unstarted.
    ///
    /// The log level of the call that starts the runtime applies to every instance.
    pub fn ensure_started(&'static self, settings: &Settings) -> Result<(), FatalError> {
        let requested = settings.log_level.inner();
        let level = *self.started.get_or_try_init(|| {
            logger_init(self.broker.as_ref(), requested);
            self.script.start().map_err(FatalError::RuntimeStart)?;
            log::info!("script runtime started");
            Ok::<_, FatalError>(requested)
        })?;
        if level != requested {
            log::debug!("bridge log level {} ignored, {} is already in effect", requested, level);
        }
        Ok(())
    }

    pub fn init_instance(&'static self, options: &PluginOptions) -> Result<S::Instance, FatalError> {
        let instance = self.script.plugin_init(self.directory(), options).map_err(FatalError::InstanceInit)?;
        log::debug!("script instance created, {} options", options.len());
        Ok(instance)
    }

    /// `instance` is consumed and must not be used again.
    pub fn cleanup_instance(&self, instance: S::Instance, options: &PluginOptions) -> StatusCode {
        let rc = self.script.plugin_cleanup(instance, options);
        log::debug!("script instance finalized, {}", rc);
        rc
    }
}
