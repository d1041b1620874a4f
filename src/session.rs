//! AnalysisSession - wires the standard handlers onto a bus
//!
//! Starting a session subscribes the event writer and (unless disabled) the
//! out-of-order disposal detector. Dropping it unsubscribes both, which also
//! releases the handlers' references back to the bus.

use std::sync::Arc;

use crate::analytics::{OutOfOrderDisposalDetector, WarnedDescriptions};
use crate::bus::{EventBus, EventHandler, EventQueue};
use crate::config::AnalysisConfig;
use crate::display::EventWriter;
use crate::error::Result;
use crate::sink::LogSink;

/// Running set of diagnostics handlers
pub struct AnalysisSession {
    bus: Arc<EventBus>,
    writer: Arc<EventWriter>,
    detector: Option<Arc<OutOfOrderDisposalDetector>>,
}

impl AnalysisSession {
    pub fn start(
        config: &AnalysisConfig,
        bus: Arc<EventBus>,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self> {
        config.validate()?;

        let writer = Arc::new(
            EventWriter::builder()
                .bus(Arc::clone(&bus))
                .sink(sink)
                .short_id_length(config.short_id_length)
                .build()?,
        );
        writer.start();

        let detector = config.detect_out_of_order_disposal.then(|| {
            let detector = Arc::new(OutOfOrderDisposalDetector::with_warned(
                Arc::clone(&bus) as Arc<dyn EventQueue>,
                Arc::new(WarnedDescriptions::new()),
            ));
            bus.subscribe(Arc::clone(&detector) as Arc<dyn EventHandler>);
            detector
        });

        tracing::info!(
            short_id_length = config.short_id_length,
            disposal_detection = detector.is_some(),
            "analysis session started"
        );

        Ok(Self {
            bus,
            writer,
            detector,
        })
    }

    /// Bus the resolution pipeline publishes to
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn detector(&self) -> Option<&Arc<OutOfOrderDisposalDetector>> {
        self.detector.as_ref()
    }

    /// Unsubscribe everything (same as dropping the session)
    pub fn stop(self) {}
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        self.writer.stop();
        if let Some(detector) = &self.detector {
            self.bus.unsubscribe(detector.as_ref());
        }
        tracing::debug!("analysis session stopped");
    }
}

impl std::fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("bus", &self.bus)
            .field("writer", &self.writer)
            .field("detector", &self.detector)
            .finish()
    }
}
