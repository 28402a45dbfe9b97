//! Customer provisioning and removal.

use serde_json::{Map, Value};

use border_core::{
    Collection, CustomerRecord, ProcessingState, RecordKey, RecordPath, UserId, UserRecord,
};
use border_store::{Mutation, StoreExt};

use super::{HandlerError, Triggers};

impl Triggers {
    /// Create the remote customer for a user and link it from `user/{userID}`.
    ///
    /// If the user already links to an existing customer record, that key is
    /// returned without calling the payment provider. Otherwise the user
    /// record is claimed with `state: pending` for the duration of the call,
    /// so concurrent provisions for one user create one remote customer.
    ///
    /// # Errors
    ///
    /// Returns `HandlerError::InProgress` if another provision holds the
    /// claim, or an error if the payment call or either write fails. Only the
    /// claim is written, and then released, when the payment call fails.
    pub async fn provision_customer(&self, user_id: &UserId) -> Result<RecordKey, HandlerError> {
        let user_key = RecordKey::from(user_id);
        let user_path = self.path(Collection::User, &user_key);

        let linked = match self.existing_customer(user_id)? {
            Link::Live(existing) => {
                tracing::info!(
                    user_id = %user_id,
                    customer_key = %existing,
                    "Customer already provisioned"
                );
                return Ok(existing);
            }
            Link::Dangling(key) => Some(key),
            Link::None => None,
        };

        if !self.claim_user(&user_path, linked.as_ref())? {
            if let Link::Live(existing) = self.existing_customer(user_id)? {
                return Ok(existing);
            }
            return Err(HandlerError::InProgress {
                collection: Collection::User,
                key: user_key.to_string(),
            });
        }

        let result = self.create_and_link(user_id, &user_path).await;
        if result.is_err() {
            if let Err(e) = self.store.set_child(&user_path, "state", Value::Null) {
                tracing::error!(
                    user_id = %user_id,
                    error = %e,
                    "Failed to release provisioning claim"
                );
            }
        }
        result
    }

    async fn create_and_link(
        &self,
        user_id: &UserId,
        user_path: &RecordPath,
    ) -> Result<RecordKey, HandlerError> {
        let customer = self.payments.create_customer(user_id).await?;
        tracing::info!(
            user_id = %user_id,
            stripe_customer_id = %customer.id,
            "Stripe customer created"
        );

        let record = CustomerRecord::new(user_id.clone(), customer.id);
        let key = self
            .store
            .push_as(&self.version, Collection::Customer, &record)?;

        let mut fields = Map::new();
        fields.insert("customerID".into(), Value::String(key.to_string()));
        fields.insert("state".into(), Value::Null);
        self.store.update(user_path, fields)?;

        tracing::info!(user_id = %user_id, customer_key = %key, "Customer linked to user");
        Ok(key)
    }

    /// Delete the remote customer linked to a user.
    ///
    /// The local customer record is left in place.
    ///
    /// # Errors
    ///
    /// Returns `HandlerError::NotFound` or `HandlerError::MissingLink` if the
    /// user or its customer cannot be resolved, or the payment error.
    pub async fn deprovision_customer(&self, user_id: &UserId) -> Result<(), HandlerError> {
        let (customer_key, customer) = self.customer_for_user(user_id)?;

        let deleted = self
            .payments
            .delete_customer(&customer.stripe_customer_id)
            .await?;

        tracing::info!(
            user_id = %user_id,
            customer_key = %customer_key,
            stripe_customer_id = %deleted.id,
            deleted = deleted.deleted,
            "Stripe customer deleted"
        );
        Ok(())
    }

    fn existing_customer(&self, user_id: &UserId) -> Result<Link, HandlerError> {
        let user: Option<UserRecord> = self
            .store
            .get_as(&self.path(Collection::User, &RecordKey::from(user_id)))?;

        let Some(key) = user.and_then(|u| u.customer_id) else {
            return Ok(Link::None);
        };

        if self
            .store
            .get(&self.path(Collection::Customer, &key))?
            .is_some()
        {
            Ok(Link::Live(key))
        } else {
            Ok(Link::Dangling(key))
        }
    }

    /// Mark the user pending if it is unclaimed and still links to `linked`.
    fn claim_user(
        &self,
        path: &RecordPath,
        linked: Option<&RecordKey>,
    ) -> Result<bool, HandlerError> {
        let committed = self.store.transaction(path, &mut |current| {
            let mut fields = match current {
                None => Map::new(),
                Some(Value::Object(fields)) => fields.clone(),
                Some(_) => return Mutation::Abort,
            };
            let Ok(user) = serde_json::from_value::<UserRecord>(Value::Object(fields.clone()))
            else {
                return Mutation::Abort;
            };
            if user.state == Some(ProcessingState::Pending)
                || user.customer_id.as_ref() != linked
            {
                return Mutation::Abort;
            }

            fields.insert("state".into(), ProcessingState::Pending.to_value());
            Mutation::Put(Value::Object(fields))
        })?;
        Ok(committed)
    }
}

/// What `user/{userID}/customerID` points at.
enum Link {
    None,
    Dangling(RecordKey),
    Live(RecordKey),
}
