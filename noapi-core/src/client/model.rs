use super::{NapConnection, RequestError};
use crate::{
    http::Transport,
    middleware::{ExecLapse, Execution, MiddlewareChain},
    types::{
        AggregateOptions, Aggregation, DeleteOptions, Filter, InsertOptions, ListOptions,
        NapResponse, Operation, ReadOptions, ResourceRequest, UpdateOptions,
    },
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Per call-site configuration: which authorization to request and which middlewares to
/// run around the call.
///
/// Built from [`NapConnection::default_connection`] and refined with [`Self::with`] and
/// [`Self::use_auth`].
#[derive(Debug)]
pub struct ConnectionModel<T> {
    conn: NapConnection<T>,
    authorization: Option<String>,
    chain: MiddlewareChain,
}

impl<T> Clone for ConnectionModel<T> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            authorization: self.authorization.clone(),
            chain: self.chain.clone(),
        }
    }
}

impl<T> ConnectionModel<T> {
    pub(crate) fn new(
        conn: NapConnection<T>,
        authorization: Option<String>,
        chain: MiddlewareChain,
    ) -> Self {
        Self {
            conn,
            authorization,
            chain,
        }
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn chain(&self) -> &MiddlewareChain {
        &self.chain
    }

    /// Attaches middlewares on both sides of the call.
    pub fn with(self, execution: impl Into<Execution>) -> Self {
        self.with_lapse(execution, ExecLapse::Always)
    }

    /// Attaches middlewares on the side(s) selected by `lapse`.
    ///
    /// A profile name that was never registered is ignored with a warning.
    pub fn with_lapse(mut self, execution: impl Into<Execution>, lapse: ExecLapse) -> Self {
        match execution.into() {
            Execution::Profile(name) => {
                let profiles = self.conn.profiles();
                if !profiles.contains(&name) {
                    tracing::warn!(
                        profile = %name,
                        "profile not found, the call will proceed without it"
                    );
                } else {
                    if lapse.runs_on_start() {
                        self.chain.push_before(profiles.before(&name).iter().cloned());
                    }
                    if lapse.runs_on_end() {
                        self.chain.push_after(profiles.after(&name).iter().cloned());
                    }
                }
            }
            Execution::Single(middleware) => self.chain.attach(&[middleware], lapse),
            Execution::Many(middlewares) => self.chain.attach(&middlewares, lapse),
        }
        self
    }

    /// Tells the server which of the user's authorizations to prefer for this call.
    pub fn use_auth(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }

    fn request(&self, resource: &str, operation: Operation) -> ResourceRequest {
        let mut request = ResourceRequest::new(resource, operation);
        request.use_auth = self.authorization.clone();
        request
    }
}

impl<T: Transport> ConnectionModel<T> {
    /// Lists records of `resource`.
    pub async fn list<R: DeserializeOwned>(
        &self,
        resource: &str,
        filter: Option<Filter>,
        options: Option<ListOptions>,
    ) -> Result<NapResponse<Vec<R>>, RequestError> {
        let mut request = self.request(resource, Operation::List);
        request.filter = filter;
        request.options = encode_options(options)?;
        self.execute(request).await
    }

    #[deprecated(since = "2.0.0", note = "use `list` instead")]
    pub async fn read<R: DeserializeOwned>(
        &self,
        resource: &str,
        filter: Option<Filter>,
        options: Option<ReadOptions>,
    ) -> Result<NapResponse<Vec<R>>, RequestError> {
        let mut request = self.request(resource, Operation::Read);
        request.filter = filter;
        request.options = encode_options(options)?;
        self.execute(request).await
    }

    /// Inserts `data` into `resource`.
    pub async fn insert<D: Serialize, R: DeserializeOwned>(
        &self,
        resource: &str,
        data: &D,
        options: Option<InsertOptions>,
    ) -> Result<NapResponse<R>, RequestError> {
        let mut request = self.request(resource, Operation::Insert);
        request.data = Some(serde_json::to_value(data).map_err(RequestError::Encode)?);
        request.options = encode_options(options)?;
        self.execute(request).await
    }

    /// Updates the records of `resource` matching `filter` with the key/values in `data`.
    ///
    /// The filter is mandatory: the server refuses unfiltered updates.
    pub async fn update<D: Serialize, R: DeserializeOwned>(
        &self,
        resource: &str,
        data: &D,
        filter: Filter,
        options: Option<UpdateOptions>,
    ) -> Result<NapResponse<R>, RequestError> {
        let mut request = self.request(resource, Operation::Update);
        request.data = Some(serde_json::to_value(data).map_err(RequestError::Encode)?);
        request.filter = Some(filter);
        request.options = encode_options(options)?;
        self.execute(request).await
    }

    /// Deletes the records of `resource` matching `filter`.
    pub async fn delete<R: DeserializeOwned>(
        &self,
        resource: &str,
        filter: Filter,
        options: Option<DeleteOptions>,
    ) -> Result<NapResponse<R>, RequestError> {
        let mut request = self.request(resource, Operation::Delete);
        request.filter = Some(filter);
        request.options = encode_options(options)?;
        self.execute(request).await
    }

    /// Asks the server to group `resource` as described by `aggregation`.
    pub async fn aggregate<R: DeserializeOwned>(
        &self,
        resource: &str,
        aggregation: Aggregation,
        filter: Option<Filter>,
        options: Option<AggregateOptions>,
    ) -> Result<NapResponse<R>, RequestError> {
        let mut request = self.request(resource, Operation::Aggregate);
        request.aggregation = Some(aggregation);
        request.filter = filter;
        request.options = encode_options(options)?;
        self.execute(request).await
    }

    async fn execute<R: DeserializeOwned>(
        &self,
        request: ResourceRequest,
    ) -> Result<NapResponse<R>, RequestError> {
        let body = serde_json::to_value(&request).map_err(RequestError::Encode)?;
        let body = self.chain.run_before(body);

        let response = self.conn.make_resource_request(body).await?;

        let response = self.chain.run_after(response);
        NapResponse::from_value(response).map_err(RequestError::Decode)
    }
}

fn encode_options<O: Serialize>(options: Option<O>) -> Result<Option<Value>, RequestError> {
    options
        .map(|o| serde_json::to_value(o).map_err(RequestError::Encode))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::middleware;

    fn conn() -> NapConnection<()> {
        NapConnection::with_transport(())
    }

    #[test]
    fn unknown_profile_leaves_model_untouched() {
        let model = conn().default_connection().with("ghost");
        assert!(model.chain().before().is_empty());
        assert!(model.chain().after().is_empty());
    }

    #[test]
    fn profile_lapse_selects_sides() {
        let conn = conn();
        conn.create_before_profile("p", vec![middleware(|ctx| ctx.data)]);
        conn.create_after_profile("p", vec![middleware(|ctx| ctx.data), middleware(|ctx| ctx.data)]);

        let start = conn.with_lapse("p", ExecLapse::OnStart);
        assert_eq!((start.chain().before().len(), start.chain().after().len()), (1, 0));

        let end = conn.with_lapse("p", ExecLapse::OnEnd);
        assert_eq!((end.chain().before().len(), end.chain().after().len()), (0, 2));

        let both = conn.with("p").with("p");
        assert_eq!((both.chain().before().len(), both.chain().after().len()), (2, 4));
    }

    #[test]
    fn profile_registered_on_one_side_only_still_counts() {
        let conn = conn();
        conn.create_after_profile("after-only", vec![middleware(|ctx| ctx.data)]);

        let model = conn.with("after-only");
        assert!(model.chain().before().is_empty());
        assert_eq!(model.chain().after().len(), 1);
    }

    #[test]
    fn single_and_many_middlewares_attach() {
        let model = conn()
            .default_connection()
            .with(middleware(|ctx| ctx.data))
            .with_lapse(
                vec![middleware(|ctx| ctx.data), middleware(|ctx| ctx.data)],
                ExecLapse::OnEnd,
            );

        assert_eq!(model.chain().before().len(), 1);
        assert_eq!(model.chain().after().len(), 3);
    }

    #[test]
    fn use_auth_overrides_default_authorization() {
        let conn = conn();
        conn.set_default_authorization(Some("user".into()));

        let model = conn.default_connection().use_auth("admin");
        assert_eq!(model.authorization(), Some("admin"));
        assert_eq!(
            model.request("users", Operation::List).use_auth.as_deref(),
            Some("admin")
        );
    }
}
