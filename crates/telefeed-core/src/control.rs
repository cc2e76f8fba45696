//! Redirection control plane.
//!
//! The boundary the command layer talks to. Every operation collapses store
//! failures to `false` / empty results and logs the detail, so nothing here
//! can take the process down. Use [`StateStore`] directly when the caller
//! needs to tell "no data" from "store unreachable".

use serde::Serialize;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::guarded::GuardedMessenger,
    store::{Filter, FilterList, StateStore, Transformation},
    Result,
};

/// Shown to users without a license.
pub const DENIED_MESSAGE: &str =
    "❌ Premium access required.\n\nUse /valide <code> to activate your license.";

/// Shown when a state-changing action could not be stored.
pub const FAILED_MESSAGE: &str = "❌ Operation failed, please try again.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RedirectionView {
    pub phone: String,
    pub source: ChatId,
    pub destination: ChatId,
}

#[derive(Clone)]
pub struct ControlPlane {
    store: StateStore,
    operator: Option<UserId>,
    messenger: Option<GuardedMessenger>,
}

impl ControlPlane {
    pub fn new(store: StateStore, operator: Option<UserId>) -> Self {
        Self {
            store,
            operator,
            messenger: None,
        }
    }

    pub fn with_messenger(mut self, messenger: GuardedMessenger) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn is_operator(&self, user: UserId) -> bool {
        self.operator == Some(user)
    }

    // Licenses

    /// Record a license code already checked by the caller.
    ///
    /// The result reports whether the write landed, not whether the code is valid.
    pub async fn validate_license(&self, user: UserId, code: &str) -> bool {
        let ok = logged(
            "validate_license",
            user,
            self.store.upsert_license(user, code).await,
        )
        .is_some();
        if ok {
            tracing::info!(user = %user, "license stored");
        }
        ok
    }

    /// The operator is always licensed, whatever the store says or whether it answers.
    pub async fn is_licensed(&self, user: UserId) -> bool {
        if self.is_operator(user) {
            return true;
        }
        logged("is_licensed", user, self.store.license(user).await)
            .flatten()
            .is_some_and(|l| l.active)
    }

    /// `Err` carries the reply for unlicensed users.
    pub async fn gate(&self, user: UserId) -> std::result::Result<(), &'static str> {
        if self.is_licensed(user).await {
            Ok(())
        } else {
            Err(DENIED_MESSAGE)
        }
    }

    pub async fn revoke_license(&self, user: UserId) -> bool {
        logged(
            "revoke_license",
            user,
            self.store.set_license_active(user, false).await,
        )
        .unwrap_or(false)
    }

    // Connections and sessions

    pub async fn register_connection(&self, user: UserId, phone: &str) -> bool {
        let ok = logged(
            "register_connection",
            user,
            self.store.upsert_connection(user, phone).await,
        )
        .is_some();
        if ok {
            tracing::info!(user = %user, phone, "connection stored");
        }
        ok
    }

    /// Connection and session rows land together or not at all.
    pub async fn register_session(&self, user: UserId, phone: &str, session_file: &str) -> bool {
        logged(
            "register_session",
            user,
            self.store
                .register_connected_session(user, phone, session_file)
                .await,
        )
        .is_some()
    }

    pub async fn disconnect(&self, user: UserId, phone: &str) -> bool {
        logged(
            "disconnect",
            user,
            self.store.deactivate_connection(user, phone).await,
        )
        .unwrap_or(false)
    }

    pub async fn list_connections(&self, user: UserId) -> Vec<String> {
        logged(
            "list_connections",
            user,
            self.store.active_connections(user).await,
        )
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.phone_number)
        .collect()
    }

    // Redirections

    pub async fn add_redirection(
        &self,
        user: UserId,
        phone: &str,
        source: ChatId,
        destination: ChatId,
    ) -> bool {
        let id = logged(
            "add_redirection",
            user,
            self.store
                .insert_redirection(user, phone, source, destination)
                .await,
        );
        if let Some(id) = id {
            tracing::info!(user = %user, id, source = %source, destination = %destination, "redirection stored");
        }
        id.is_some()
    }

    pub async fn list_redirections(&self, user: UserId) -> Vec<RedirectionView> {
        logged(
            "list_redirections",
            user,
            self.store.active_redirections(user).await,
        )
        .unwrap_or_default()
        .into_iter()
        .map(|r| RedirectionView {
            phone: r.phone_number,
            source: r.source_chat_id,
            destination: r.destination_chat_id,
        })
        .collect()
    }

    pub async fn remove_redirection(&self, user: UserId, id: i64) -> bool {
        logged(
            "remove_redirection",
            user,
            self.store.deactivate_redirection(user, id).await,
        )
        .unwrap_or(false)
    }

    // Transformations and filters

    pub async fn add_transformation(
        &self,
        user: UserId,
        phone: &str,
        transformation_type: &str,
        settings: &serde_json::Value,
    ) -> bool {
        logged(
            "add_transformation",
            user,
            self.store
                .insert_transformation(user, phone, transformation_type, settings)
                .await,
        )
        .is_some()
    }

    pub async fn list_transformations(&self, user: UserId, phone: &str) -> Vec<Transformation> {
        logged(
            "list_transformations",
            user,
            self.store.active_transformations(user, phone).await,
        )
        .unwrap_or_default()
    }

    pub async fn add_filter(
        &self,
        list: FilterList,
        user: UserId,
        phone: &str,
        name: &str,
        value: &str,
    ) -> bool {
        logged(
            "add_filter",
            user,
            self.store
                .insert_filter(list, user, phone, name, value)
                .await,
        )
        .is_some()
    }

    pub async fn list_filters(&self, list: FilterList, user: UserId, phone: &str) -> Vec<Filter> {
        logged(
            "list_filters",
            user,
            self.store.active_filters(list, user, phone).await,
        )
        .unwrap_or_default()
    }

    // Transport

    /// Forward `message` to every active destination of the user's matching rules.
    ///
    /// Returns how many forwards were delivered. Unlicensed users relay nothing;
    /// failed forwards are classified and skipped.
    pub async fn relay(&self, user: UserId, phone: &str, message: MessageRef) -> usize {
        let Some(messenger) = &self.messenger else {
            tracing::warn!(user = %user, "relay requested without a messenger");
            return 0;
        };
        if self.gate(user).await.is_err() {
            tracing::info!(user = %user, "relay skipped; no active license");
            return 0;
        }

        let rules = logged("relay", user, self.store.active_redirections(user).await)
            .unwrap_or_default();

        let mut delivered = 0usize;
        for rule in rules
            .iter()
            .filter(|r| r.phone_number == phone && r.source_chat_id == message.chat_id)
        {
            if messenger
                .forward_message(rule.destination_chat_id, message)
                .await
                .is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn store_healthy(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "store ping failed");
                false
            }
        }
    }
}

fn logged<T>(operation: &str, user: UserId, res: Result<T>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::error!(operation, user = %user, error = %e, "store operation failed");
            None
        }
    }
}
