//! Client-side half of the system: the background orchestrator a browser
//! extension runs, driven by messages from its page and popup surfaces.

use async_trait::async_trait;
use tokio::sync::mpsc;

pub mod api_client;
pub mod background;
pub mod messages;

pub use api_client::ApiClient;
pub use background::{BackgroundClient, BackgroundHandler, BackgroundMessage, BackgroundService};
pub use messages::*;

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

/// Drains a channel, handing each message to its own task.
#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}
