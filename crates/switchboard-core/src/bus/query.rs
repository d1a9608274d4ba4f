//! QueryBus - 同じクエリ名に複数のハンドラを持てるバス
//!
//! クエリ名 → サブスクリプション集合。サブスクリプションは応答型の記述子を持ち、
//! クエリの期待する応答型と一致するものだけが呼ばれます。
//!
//! - `query`: 一致する最初のハンドラだけを呼ぶ（選択順は不定）
//! - `scatter_gather`: 一致するハンドラを順番に呼ぶ遅延ストリーム

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace};

use super::registration::Registration;
use crate::domain::{BusError, QueryMessage, ResponseType, ResultMessage};
use crate::ports::{IdGenerator, SharedQueryHandler, SystemClock, UlidGenerator, hash_handler, same_handler};
use crate::registry::{ConcurrentMap, ConcurrentSet, RegistryConfig, RegistryError};

/// A handler together with the response type it produces.
///
/// Two subscriptions are equal when they wrap the same handler instance with the same
/// response type.
#[derive(Clone)]
pub struct QuerySubscription {
    response_type: ResponseType,
    handler: SharedQueryHandler,
}

impl QuerySubscription {
    pub fn new(response_type: ResponseType, handler: SharedQueryHandler) -> Self {
        Self {
            response_type,
            handler,
        }
    }

    pub fn response_type(&self) -> &ResponseType {
        &self.response_type
    }

    pub fn handler(&self) -> &SharedQueryHandler {
        &self.handler
    }
}

impl PartialEq for QuerySubscription {
    fn eq(&self, other: &Self) -> bool {
        self.response_type == other.response_type && same_handler(&self.handler, &other.handler)
    }
}

impl Eq for QuerySubscription {}

impl Hash for QuerySubscription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.response_type.hash(state);
        hash_handler(&self.handler, state);
    }
}

impl fmt::Debug for QuerySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySubscription")
            .field("response_type", &self.response_type)
            .finish_non_exhaustive()
    }
}

type Subscriptions = ConcurrentMap<String, Arc<ConcurrentSet<QuerySubscription>>>;

/// Routes queries to the handlers whose response type matches.
pub struct QueryBus {
    subscriptions: Arc<Subscriptions>,
    ids: Arc<dyn IdGenerator>,
}

impl QueryBus {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(ConcurrentMap::new()),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    /// Sizes the name → subscriptions registry from `config`.
    pub fn with_registry(config: &RegistryConfig) -> Result<Self, RegistryError> {
        Ok(Self {
            subscriptions: Arc::new(ConcurrentMap::with_config(config)?),
            ..Self::new()
        })
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Subscribes `handler` under `query_name`, answering with `response_type`.
    ///
    /// Subscribing the same handler with the same response type twice keeps a single
    /// subscription.
    pub fn subscribe(
        &self,
        query_name: impl Into<String>,
        response_type: ResponseType,
        handler: SharedQueryHandler,
    ) -> Registration {
        let query_name = query_name.into();
        let subscription = QuerySubscription::new(response_type, handler);
        // per-name sets are never removed, so the registration can hold on to this one
        let handlers = self
            .subscriptions
            .get_or_insert_with(query_name.clone(), || Arc::new(ConcurrentSet::new()));
        if handlers.add(subscription.clone()) {
            debug!(query_name = %query_name, %response_type, "query handler subscribed");
        } else {
            debug!(query_name = %query_name, %response_type, "query handler already subscribed");
        }

        Registration::new(self.ids.subscription_id(), move || {
            let removed = handlers.remove(&subscription);
            if removed {
                debug!(query_name = %query_name, "query handler unsubscribed");
            }
            removed
        })
    }

    /// Asks one matching handler and converts its answer into `R`.
    ///
    /// Fails with `NoHandlerForQuery` when nothing matches; a failing handler yields a
    /// failed `ResultMessage`.
    pub async fn query<R>(&self, query: &QueryMessage) -> Result<ResultMessage<R>, BusError>
    where
        R: DeserializeOwned + 'static,
    {
        let subscription = self.matching(query).into_iter().next().ok_or_else(|| {
            BusError::NoHandlerForQuery {
                query_name: query.query_name().to_string(),
                response_type: *query.response_type(),
            }
        })?;
        let response_type = *query.response_type();
        Ok(invoke(subscription.handler(), query)
            .await
            .try_map(|value| response_type.convert::<R>(Some(value))))
    }

    /// Asks every handler matching at call time, one after another, as the stream is polled.
    ///
    /// Results without a payload are skipped; failed handlers show up as failed results.
    /// No matching handler gives an empty stream.
    pub fn scatter_gather<R>(&self, query: &QueryMessage) -> BoxStream<'static, ResultMessage<R>>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let handlers = self.matching(query);
        trace!(
            query_name = query.query_name(),
            handlers = handlers.len(),
            "scatter-gather"
        );
        let query = query.clone();
        stream::iter(handlers)
            .then(move |subscription| {
                let query = query.clone();
                async move {
                    let response_type = *query.response_type();
                    invoke(subscription.handler(), &query)
                        .await
                        .try_map(|value| response_type.convert::<R>(Some(value)))
                }
            })
            .filter(|result| future::ready(!result.is_success() || result.payload().is_some()))
            .boxed()
    }

    /// Point-in-time view of the active subscriptions per query name.
    pub fn subscriptions(&self) -> BTreeMap<String, Vec<QuerySubscription>> {
        self.subscriptions
            .snapshot()
            .into_iter()
            .map(|(name, handlers)| (name, handlers.snapshot()))
            .filter(|(_, handlers)| !handlers.is_empty())
            .collect()
    }

    fn matching(&self, query: &QueryMessage) -> Vec<QuerySubscription> {
        let expected = query.response_type();
        self.subscriptions
            .get(query.query_name())
            .map(|handlers| {
                handlers
                    .snapshot()
                    .into_iter()
                    .filter(|subscription| expected.matches(subscription.response_type()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

async fn invoke(handler: &SharedQueryHandler, query: &QueryMessage) -> ResultMessage<Value> {
    match handler.handle(query).await {
        Ok(reply) => ResultMessage::from_reply(reply),
        Err(error) => {
            debug!(query_name = query.query_name(), error = %error, "query handler failed");
            ResultMessage::failure(error)
        }
    }
}

impl Default for QueryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBus")
            .field("subscriptions", &self.subscriptions())
            .finish()
    }
}
