//! Sentence processing: decode, enrich and notify
//!
//! The dispatcher is the single consumer of the ingestion queue. It handles
//! one line at a time, in arrival order, and invokes listener callbacks on a
//! dedicated thread, so a slow callback never holds up the socket reader or
//! the keep-alive. Decoder, provider and listener failures (errors or
//! panics) are logged and contained: the line or the listener is skipped,
//! the loop keeps going.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    client::{listener::ListenerRegistry, queue::IngestionQueue},
    config::ClientConfig,
    descriptor::find_descriptor,
    protocol::{
        SentenceDecoder,
        beacon::{AircraftBeacon, AircraftDescriptor, Beacon, ReceiverBeacon},
    },
};

pub(crate) struct Dispatcher {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) decoder: Arc<dyn SentenceDecoder>,
    pub(crate) listeners: Arc<ListenerRegistry>,
    pub(crate) queue: Arc<IngestionQueue>,
}

impl Dispatcher {
    /// Starts the dispatcher thread
    ///
    /// If `previous` is given, the new thread first waits for it to finish,
    /// so two dispatchers never deliver at the same time.
    pub(crate) fn spawn(
        self,
        runtime: Handle,
        shutdown: CancellationToken,
        previous: Option<thread::JoinHandle<()>>,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("ogn-dispatcher".to_string())
            .spawn(move || {
                if let Some(previous) = previous {
                    trace!("waiting for previous dispatcher");
                    let _ = previous.join();
                }
                self.run(&runtime, &shutdown);
            })
    }

    /// Processes queued lines until `shutdown` is cancelled
    ///
    /// Blocks the calling thread, which must not be a runtime worker.
    pub(crate) fn run(&self, runtime: &Handle, shutdown: &CancellationToken) {
        trace!("dispatcher starting");

        loop {
            let line = runtime.block_on(async {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => None,
                    line = self.queue.pop() => Some(line),
                }
            });

            match line {
                None => break,
                Some(Some(line)) => self.process(&line),
                Some(None) => {
                    warn!("ingestion queue closed");
                    break;
                }
            }
        }

        trace!("dispatcher stopped");
    }

    /// Decodes one line and delivers the resulting beacon, if any
    pub(crate) fn process(&self, line: &str) {
        trace!("{}", line);

        let allow_aircraft = !self.config.ignore_aircraft_beacons();
        let allow_receiver = !self.config.ignore_receiver_beacons();

        let decoded = catch_unwind(AssertUnwindSafe(|| {
            self.decoder.decode(line, allow_aircraft, allow_receiver)
        }));

        // A beacon may be missing because the line is not a beacon, could not
        // be decoded, or its kind is disabled.
        let beacon = match decoded {
            Ok(Ok(Some(beacon))) => beacon,
            Ok(Ok(None)) => return,
            Ok(Err(e)) => {
                debug!(error = %e, line, "could not decode sentence");
                return;
            }
            Err(_) => {
                warn!(line, "sentence decoder panicked");
                return;
            }
        };

        match beacon {
            Beacon::Aircraft(beacon) => self.notify_aircraft(&beacon),
            Beacon::Receiver(beacon) => self.notify_receiver(&beacon),
        }
    }

    fn notify_aircraft(&self, beacon: &AircraftBeacon) {
        let listeners = self.listeners.aircraft.snapshot();
        if listeners.is_empty() {
            return;
        }

        let descriptor = self.descriptor_for(beacon);
        for listener in listeners.iter() {
            let delivered = catch_unwind(AssertUnwindSafe(|| {
                listener.on_update(beacon, descriptor.as_ref())
            }));
            if delivered.is_err() {
                warn!(address = %beacon.address, "aircraft beacon listener panicked");
            }
        }
    }

    fn notify_receiver(&self, beacon: &ReceiverBeacon) {
        for listener in self.listeners.receiver.snapshot().iter() {
            let delivered = catch_unwind(AssertUnwindSafe(|| listener.on_update(beacon)));
            if delivered.is_err() {
                warn!(id = %beacon.id, "receiver beacon listener panicked");
            }
        }
    }

    fn descriptor_for(&self, beacon: &AircraftBeacon) -> Option<AircraftDescriptor> {
        let providers = self.config.descriptor_providers();
        match catch_unwind(AssertUnwindSafe(|| find_descriptor(providers, &beacon.address))) {
            Ok(descriptor) => descriptor,
            Err(_) => {
                warn!(address = %beacon.address, "aircraft descriptor provider panicked");
                None
            }
        }
    }
}
