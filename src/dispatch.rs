//! Runs backend requests off the UI thread.
//!
//! The UI loop owns the controller and never awaits. Requests are spawned on
//! a tokio runtime; results come back as `DispatchEvent`s over a std channel
//! that the loop drains between frames.

use std::future::Future;
use std::sync::mpsc::{self, Receiver, Sender};

use tokio::runtime::Handle;
use tracing::debug;

use crate::backend::{BackendClient, BackendError, GenerateWorldRequest, SaveWorldResponse};
use crate::controller::{BackendRequest, BackendResponse};
use crate::world_file::WorldFile;

/// Result of a background operation, delivered to the UI thread.
#[derive(Debug)]
pub enum DispatchEvent {
    /// Answer to a controller request
    Backend(BackendResponse),
    /// A freshly generated world payload
    WorldReceived {
        source: String,
        result: Result<serde_json::Value, BackendError>,
    },
    WorldSaved {
        edit_seq: u64,
        result: Result<SaveWorldResponse, BackendError>,
    },
}

/// Spawns backend calls and reports their results.
#[derive(Clone)]
pub struct Dispatcher {
    client: BackendClient,
    runtime: Handle,
    tx: Sender<DispatchEvent>,
}

impl Dispatcher {
    pub fn new(client: BackendClient, runtime: Handle) -> (Self, Receiver<DispatchEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { client, runtime, tx }, rx)
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    /// Run a future and send its event. A closed channel means the UI is gone.
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = DispatchEvent> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let event = task.await;
            if tx.send(event).is_err() {
                debug!("ui gone, dropping backend result");
            }
        });
    }

    pub fn dispatch(&self, request: BackendRequest) {
        let client = self.client.clone();
        match request {
            BackendRequest::FetchMovement { ticket, coord } => self.spawn(async move {
                let result = client.hex_movement(coord).await;
                DispatchEvent::Backend(BackendResponse::Movement { ticket, coord, result })
            }),
            BackendRequest::PushWorld { edit_seq, payload } => self.spawn(async move {
                let result = client.update_world_data(&payload).await;
                DispatchEvent::Backend(BackendResponse::WorldPushed { edit_seq, result })
            }),
        }
    }

    pub fn dispatch_all(&self, requests: Vec<BackendRequest>) {
        for request in requests {
            self.dispatch(request);
        }
    }

    pub fn generate_world(&self, request: GenerateWorldRequest) {
        let client = self.client.clone();
        self.spawn(async move {
            let result = client.generate_world(&request).await;
            DispatchEvent::WorldReceived {
                source: format!("generated {}x{}", request.width, request.height),
                result,
            }
        });
    }

    /// Save a snapshot taken at `edit_seq` under `filename`.
    pub fn save_world(&self, edit_seq: u64, world: WorldFile, filename: Option<String>) {
        let client = self.client.clone();
        self.spawn(async move {
            let result = client.save_world(&world, filename.as_deref()).await;
            DispatchEvent::WorldSaved { edit_seq, result }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendConfig;
    use crate::world::HexCoord;
    use std::time::Duration;

    #[test]
    fn test_failed_fetch_comes_back_with_ticket() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        // Nothing listens on port 1
        let client = BackendClient::new(&BackendConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
        })
        .unwrap();
        let (dispatcher, rx) = Dispatcher::new(client, runtime.handle().clone());

        dispatcher.dispatch(BackendRequest::FetchMovement {
            ticket: 7,
            coord: HexCoord::new(0, 0),
        });

        match rx.recv_timeout(Duration::from_secs(10)).unwrap() {
            DispatchEvent::Backend(BackendResponse::Movement { ticket, coord, result }) => {
                assert_eq!(ticket, 7);
                assert_eq!(coord, HexCoord::new(0, 0));
                assert!(result.is_err());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
