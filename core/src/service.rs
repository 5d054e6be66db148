//! Namespaced entry point over a [`Context`].
//!
//! # Design
//! `BaseService` adds nothing to `Context`; `Service` wraps it and derefs to
//! it, so every context operation is available on a service. A service can
//! be re-scoped to another owner/app with [`Service::specialize`] without
//! logging in again.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::context::Context;
use crate::http::Http;

pub type BaseService = Context;

/// Client handle for a splunkd instance, scoped to an owner/app pair.
#[derive(Debug, Clone)]
pub struct Service {
    base: BaseService,
}

impl Service {
    pub fn new(http: Arc<dyn Http>, config: Config) -> Self {
        Self {
            base: BaseService::new(http, config),
        }
    }

    /// A service for the `owner`/`app` namespace that reuses this service's
    /// transport, settings and session.
    ///
    /// `owner` "nobody" means no specific user and "-" means all users;
    /// `app` "-" means all apps.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use splunk_sdk::{Config, Http, HttpRequest, HttpResponse, Namespace, Service};
    /// # struct Offline;
    /// # impl Http for Offline {
    /// #     fn make_request(&self, _: HttpRequest) -> splunk_sdk::Result<HttpResponse> {
    /// #         Ok(HttpResponse::default())
    /// #     }
    /// # }
    /// let svc = Service::new(Arc::new(Offline), Config::default());
    /// let unix = svc.specialize("myuser", "unix");
    /// assert_eq!(
    ///     unix.fullpath("data/inputs", &Namespace::default()),
    ///     "/servicesNS/myuser/unix/data/inputs"
    /// );
    /// ```
    pub fn specialize(&self, owner: &str, app: &str) -> Service {
        debug!(owner, app, "specializing service");
        Service {
            base: self.base.rescoped(owner, app),
        }
    }
}

impl Deref for Service {
    type Target = BaseService;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl DerefMut for Service {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}
