//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances behind the HTTP API. Core services are generic over repository, broker, and
//! mailer traits; AppState pins them to the infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use relaychat_core::broker::memory::InMemoryBroker;
use relaychat_core::chat::service::ChatService;
use relaychat_core::notify::consumer::{DEFAULT_QUEUE_CAPACITY, NotificationConsumer, NotificationWorker};
use relaychat_core::notify::service::NotificationService;
use relaychat_core::saga::{RetryPolicy, SagaOrchestrator};
use relaychat_core::stream::{StreamDispatcher, SubscriptionRegistry};
use relaychat_infra::config::{email_token, load_config, resolve_data_dir, resolve_database_url};
use relaychat_infra::email::Mailer;
use relaychat_infra::preview::Previewer;
use relaychat_infra::sqlite::chat::SqliteChatRepository;
use relaychat_infra::sqlite::directory::SqliteRecipientDirectory;
use relaychat_infra::sqlite::pool::DatabasePool;
use relaychat_types::config::RelayConfig;
use tokio_util::sync::CancellationToken;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteChatService = ChatService<SqliteChatRepository, Previewer, InMemoryBroker>;

pub type ConcreteDispatcher = StreamDispatcher<SqliteChatRepository, InMemoryBroker>;

pub type ConcreteSagaOrchestrator = SagaOrchestrator<SqliteChatRepository, Mailer>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub dispatcher: Arc<ConcreteDispatcher>,
    pub saga: Arc<ConcreteSagaOrchestrator>,
    pub notifications: Arc<NotificationService<Mailer>>,
    pub broker: Arc<InMemoryBroker>,
    pub registry: Arc<SubscriptionRegistry<InMemoryBroker>>,
    pub config: Arc<RelayConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    mailer: Mailer,
    /// Cancelled on server shutdown; every open stream holds a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Initialize from the data directory: load config, connect to the DB,
    /// wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        Self::from_config(config, data_dir).await
    }

    pub async fn from_config(config: RelayConfig, data_dir: PathBuf) -> anyhow::Result<Self> {
        let db_url = resolve_database_url(&config, &data_dir);
        let db_pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("failed to open database {db_url}"))?;

        let broker = Arc::new(InMemoryBroker::from_url(&config.broker_url, config.subscriber_buffer)?);
        let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&broker), config.channel_capacity));

        let previewer = Previewer::from_config(&config).context("failed to build link previewer")?;
        let mailer = Mailer::from_config(&config.email, email_token()).context("failed to build mailer")?;

        let chat_repo = SqliteChatRepository::new(db_pool.clone());
        let chat_service = ChatService::new(chat_repo.clone(), previewer, Arc::clone(&broker));
        let dispatcher = StreamDispatcher::new(chat_repo.clone(), Arc::clone(&registry));
        let saga = SagaOrchestrator::new(
            chat_repo,
            mailer.clone(),
            RetryPolicy::new(config.saga.max_retries),
        );
        let notifications = NotificationService::new(mailer.clone());

        tracing::debug!(
            data_dir = %data_dir.display(),
            broker = %config.broker_url,
            channel_capacity = config.channel_capacity,
            "application state initialized"
        );

        Ok(Self {
            chat_service: Arc::new(chat_service),
            dispatcher: Arc::new(dispatcher),
            saga: Arc::new(saga),
            notifications: Arc::new(notifications),
            broker,
            registry,
            config: Arc::new(config),
            data_dir,
            db_pool,
            mailer,
            shutdown: CancellationToken::new(),
        })
    }

    /// Start the background consumer that emails chat members on every
    /// published message.
    pub async fn start_notifier(&self) -> anyhow::Result<NotificationConsumer<InMemoryBroker>> {
        let worker = NotificationWorker::new(
            SqliteRecipientDirectory::new(self.db_pool.clone()),
            self.mailer.clone(),
            self.config.notifier.dedupe_window,
        );
        let consumer =
            NotificationConsumer::start(Arc::clone(&self.broker), worker, DEFAULT_QUEUE_CAPACITY).await?;
        Ok(consumer)
    }
}
