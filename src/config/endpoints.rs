//! Downstream service locations.

use url::Url;

use crate::{Error, Result};

/// Base URLs of the storefront backends.
///
/// Hosts follow the service names of the shop deployment. An optional DNS
/// domain is appended to every host.
///
/// ## Example
///
/// ```rust
/// use storefront_edge::config::Endpoints;
///
/// let endpoints = Endpoints::for_domain(Some("shop.svc"));
/// assert_eq!(endpoints.carts, "http://carts.shop.svc/carts");
///
/// let url = endpoints.cart_item("c1", "sock-9").unwrap();
/// assert_eq!(url.as_str(), "http://carts.shop.svc/carts/c1/items/sock-9");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct Endpoints {
    /// Catalogue service root.
    #[builder(into, default = "http://catalogue".to_string())]
    pub catalogue: String,

    /// Catalogue tag listing.
    #[builder(into, default = "http://catalogue/tags".to_string())]
    pub tags: String,

    /// Cart collection.
    #[builder(into, default = "http://carts/carts".to_string())]
    pub carts: String,

    /// Orders service root.
    #[builder(into, default = "http://orders".to_string())]
    pub orders: String,

    /// Customer collection.
    #[builder(into, default = "http://user/customers".to_string())]
    pub customers: String,

    /// Address collection.
    #[builder(into, default = "http://user/addresses".to_string())]
    pub addresses: String,

    /// Card collection.
    #[builder(into, default = "http://user/cards".to_string())]
    pub cards: String,

    /// Login endpoint.
    #[builder(into, default = "http://user/login".to_string())]
    pub login: String,

    /// Registration endpoint.
    #[builder(into, default = "http://user/register".to_string())]
    pub register: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Endpoints {
    /// Creates endpoints whose hosts carry `domain` as a suffix.
    pub fn for_domain(domain: Option<&str>) -> Self {
        let suffix = match domain.map(str::trim) {
            Some(d) if !d.is_empty() => format!(".{}", d),
            _ => String::new(),
        };
        Self {
            catalogue: format!("http://catalogue{}", suffix),
            tags: format!("http://catalogue{}/tags", suffix),
            carts: format!("http://carts{}/carts", suffix),
            orders: format!("http://orders{}", suffix),
            customers: format!("http://user{}/customers", suffix),
            addresses: format!("http://user{}/addresses", suffix),
            cards: format!("http://user{}/cards", suffix),
            login: format!("http://user{}/login", suffix),
            register: format!("http://user{}/register", suffix),
        }
    }

    /// Loads endpoints from `DOMAIN`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::for_domain(super::env::string(&lookup, "DOMAIN").as_deref())
    }

    /// Loads endpoints from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(super::env::process)
    }

    /// `GET` target for one catalogue item.
    pub fn catalogue_item(&self, item_id: &str) -> Result<Url> {
        join(&self.catalogue, &["catalogue", item_id])
    }

    /// A catalogue path such as an image, passed through verbatim.
    pub fn catalogue_path(&self, path: &str) -> Result<Url> {
        append_path(&self.catalogue, path)
    }

    /// Tag listing.
    pub fn tags_url(&self) -> Result<Url> {
        parse(&self.tags)
    }

    /// A customer's cart.
    pub fn cart(&self, customer_id: &str) -> Result<Url> {
        join(&self.carts, &[customer_id])
    }

    /// Items in a customer's cart.
    pub fn cart_items(&self, customer_id: &str) -> Result<Url> {
        join(&self.carts, &[customer_id, "items"])
    }

    /// One item in a customer's cart.
    pub fn cart_item(&self, customer_id: &str, item_id: &str) -> Result<Url> {
        join(&self.carts, &[customer_id, "items", item_id])
    }

    /// Merges the anonymous session cart into the customer's cart.
    pub fn cart_merge(&self, customer_id: &str, session_id: &str) -> Result<Url> {
        let mut url = join(&self.carts, &[customer_id, "merge"])?;
        url.query_pairs_mut().append_pair("sessionId", session_id);
        Ok(url)
    }

    /// One customer profile.
    pub fn customer(&self, customer_id: &str) -> Result<Url> {
        join(&self.customers, &[customer_id])
    }

    /// Cards on file for a customer.
    pub fn customer_cards(&self, customer_id: &str) -> Result<Url> {
        join(&self.customers, &[customer_id, "cards"])
    }

    /// Addresses on file for a customer.
    pub fn customer_addresses(&self, customer_id: &str) -> Result<Url> {
        join(&self.customers, &[customer_id, "addresses"])
    }

    /// Address collection.
    pub fn addresses_url(&self) -> Result<Url> {
        parse(&self.addresses)
    }

    /// Card collection.
    pub fn cards_url(&self) -> Result<Url> {
        parse(&self.cards)
    }

    /// A customer's orders, newest first.
    pub fn orders_search(&self, customer_id: &str) -> Result<Url> {
        let mut url = join(&self.orders, &["orders", "search", "customerId"])?;
        url.query_pairs_mut()
            .append_pair("sort", "date")
            .append_pair("custId", customer_id);
        Ok(url)
    }

    /// Order collection.
    pub fn orders(&self) -> Result<Url> {
        join(&self.orders, &["orders"])
    }

    /// An orders path passed through verbatim.
    pub fn orders_path(&self, path: &str) -> Result<Url> {
        append_path(&self.orders, path)
    }

    /// Login endpoint.
    pub fn login_url(&self) -> Result<Url> {
        parse(&self.login)
    }

    /// Registration endpoint.
    pub fn register_url(&self) -> Result<Url> {
        parse(&self.register)
    }
}

fn parse(base: &str) -> Result<Url> {
    Url::parse(base)
        .map_err(|e| Error::configuration(format!("invalid endpoint {}: {}", base, e)).with_source(e))
}

fn join(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = parse(base)?;
    url.path_segments_mut()
        .map_err(|_| Error::configuration(format!("endpoint cannot carry a path: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn append_path(base: &str, path: &str) -> Result<Url> {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    parse(&format!("{}/{}", base, path))
}
