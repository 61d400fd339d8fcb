//! Per-conversation coordination.
//!
//! Each conversation gets a worker task that owns its streaming parser. Callers talk to it
//! through a cloneable [`Session`] handle; commands are handled one at a time in arrival order,
//! so a conversation never runs two `build` or `process` calls at once. Distinct conversations
//! run on distinct tasks and share only the [`Engine`].

use async_stream::stream;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::architecture::ModelDescriptor;
use crate::engine::Engine;
use crate::errors::ConfigError;
use crate::models::channel::ProcessedOutput;
use crate::models::message::BuildParameters;
use crate::parser::StreamingParser;

const COMMAND_QUEUE_SIZE: usize = 32;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Conversation worker has stopped")]
    WorkerGone,
}

enum Command {
    Build {
        params: Box<BuildParameters>,
        reply: oneshot::Sender<Result<String, ConfigError>>,
    },
    Push {
        chunk: String,
        reply: oneshot::Sender<ProcessedOutput>,
    },
    Replace {
        text: String,
        reply: oneshot::Sender<ProcessedOutput>,
    },
    Finish {
        reply: oneshot::Sender<ProcessedOutput>,
    },
}

/// Handle to one conversation's worker
#[derive(Clone, Debug)]
pub struct Session {
    model: ModelDescriptor,
    tx: mpsc::Sender<Command>,
}

impl Session {
    /// Start a worker for a conversation with `model`. Must be called inside a Tokio runtime.
    pub fn spawn(engine: Arc<Engine>, model: ModelDescriptor) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let worker = Worker {
            parser: engine.streaming_parser(&model),
            engine,
            rx,
        };
        tokio::spawn(worker.run());
        Self { model, tx }
    }

    pub fn model(&self) -> &ModelDescriptor {
        &self.model
    }

    pub async fn build(&self, params: BuildParameters) -> Result<String, SessionError> {
        let result = self
            .request(|reply| Command::Build {
                params: Box::new(params),
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Append a chunk of the current generation
    pub async fn push(&self, chunk: impl Into<String>) -> Result<ProcessedOutput, SessionError> {
        let chunk = chunk.into();
        self.request(|reply| Command::Push { chunk, reply }).await
    }

    /// Replace the current generation's text with the full buffer produced so far
    pub async fn replace(&self, text: impl Into<String>) -> Result<ProcessedOutput, SessionError> {
        let text = text.into();
        self.request(|reply| Command::Replace { text, reply }).await
    }

    /// Complete the current generation; the next push starts a new one
    pub async fn finish(&self) -> Result<ProcessedOutput, SessionError> {
        self.request(|reply| Command::Finish { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::WorkerGone)?;
        response.await.map_err(|_| SessionError::WorkerGone)
    }
}

struct Worker {
    engine: Arc<Engine>,
    parser: StreamingParser,
    rx: mpsc::Receiver<Command>,
}

impl Worker {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            // a dropped reply receiver only means the caller stopped waiting
            match command {
                Command::Build { params, reply } => {
                    let _ = reply.send(self.engine.build(&params));
                }
                Command::Push { chunk, reply } => {
                    let _ = reply.send(self.parser.push(&chunk));
                }
                Command::Replace { text, reply } => {
                    let _ = reply.send(self.parser.replace(&text));
                }
                Command::Finish { reply } => {
                    let output = self.parser.finish();
                    self.parser.reset();
                    let _ = reply.send(output);
                }
            }
        }
        tracing::debug!(model = %self.parser.architecture(), "conversation worker stopped");
    }
}

/// Registry of running conversations keyed by conversation id
pub struct Conversations {
    engine: Arc<Engine>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl Conversations {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The session for `id`, starting one for `model` if none is running.
    ///
    /// A running session keeps the model it was started with.
    pub async fn session(&self, id: &str, model: &ModelDescriptor) -> Session {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::spawn(self.engine.clone(), model.clone()))
            .clone()
    }

    /// Forget a conversation. Its worker stops once every handle is dropped.
    pub async fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.lock().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

/// Turn a stream of generated chunks into a stream of parse snapshots.
///
/// One snapshot is yielded per chunk, then a final one once the chunk stream ends.
pub fn process_stream<S>(
    mut parser: StreamingParser,
    chunks: S,
) -> impl Stream<Item = ProcessedOutput>
where
    S: Stream<Item = String>,
{
    stream! {
        futures::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            yield parser.push(&chunk);
        }
        yield parser.finish();
    }
}
