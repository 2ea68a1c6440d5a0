//! Endpoint registry for the Harvest API v2
//!
//! The registry is the static table of resources that make up a backup. Each
//! [`EndpointDescriptor`] tells the executor how to treat a resource: a
//! singleton written as `data.json`, a paginated list written as `list.json`
//! (optionally with per-item files), nested per-item sub-resources, and
//! whether items carry a downloadable PDF.

/// Shape of an endpoint, derived from its descriptor flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Single object, no pagination (e.g. `/v2/company`)
    Singleton,
    /// Paginated collection
    List,
}

/// Static description of one backed-up resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// API path, e.g. `/v2/clients`
    pub path: &'static str,
    /// Resource name, used as the output directory name
    pub name: &'static str,
    /// Whether the endpoint is a paginated list
    pub has_list: bool,
    /// Whether one file per item is written next to `list.json`
    pub has_detail: bool,
    /// Per-item sub-resource templates; `{id}` is replaced by the parent id
    pub nested_paths: &'static [&'static str],
    /// Whether items expose a PDF through a public client link
    pub has_pdf: bool,
}

impl EndpointDescriptor {
    /// Paginated list with per-item detail files
    pub const fn list(path: &'static str, name: &'static str) -> Self {
        Self {
            path,
            name,
            has_list: true,
            has_detail: true,
            nested_paths: &[],
            has_pdf: false,
        }
    }

    /// Single object written as `data.json`
    pub const fn singleton(path: &'static str, name: &'static str) -> Self {
        Self {
            path,
            name,
            has_list: false,
            has_detail: false,
            nested_paths: &[],
            has_pdf: false,
        }
    }

    /// Drop per-item detail files
    pub const fn without_detail(mut self) -> Self {
        self.has_detail = false;
        self
    }

    /// Attach nested per-item sub-resource templates
    pub const fn with_nested(mut self, nested_paths: &'static [&'static str]) -> Self {
        self.nested_paths = nested_paths;
        self
    }

    /// Mark items as carrying a client-link PDF
    pub const fn with_pdf(mut self) -> Self {
        self.has_pdf = true;
        self
    }

    /// Classify the descriptor
    ///
    /// A descriptor with neither list nor detail views is a singleton.
    pub fn kind(&self) -> EndpointKind {
        if !self.has_list && !self.has_detail {
            EndpointKind::Singleton
        } else {
            EndpointKind::List
        }
    }

    /// Whether the endpoint has nested per-item sub-resources
    pub fn has_nested(&self) -> bool {
        !self.nested_paths.is_empty()
    }

    /// Whether this is the company profile, which is fetched during account setup
    pub fn is_company(&self) -> bool {
        self.name == "company"
    }
}

/// All endpoints, in backup order
pub const ENDPOINTS: &[EndpointDescriptor] = &[
    EndpointDescriptor::list("/v2/clients", "clients"),
    EndpointDescriptor::list("/v2/contacts", "contacts"),
    EndpointDescriptor::list("/v2/projects", "projects").with_nested(&[
        "/v2/projects/{id}/user_assignments",
        "/v2/projects/{id}/task_assignments",
    ]),
    EndpointDescriptor::list("/v2/tasks", "tasks"),
    EndpointDescriptor::list("/v2/time_entries", "time_entries"),
    EndpointDescriptor::list("/v2/users", "users").with_nested(&[
        "/v2/users/{id}/billable_rates",
        "/v2/users/{id}/cost_rates",
        "/v2/users/{id}/project_assignments",
        "/v2/users/{id}/teammates",
    ]),
    EndpointDescriptor::singleton("/v2/users/me", "users_me"),
    EndpointDescriptor::list(
        "/v2/users/me/project_assignments",
        "users_me_project_assignments",
    )
    .without_detail(),
    EndpointDescriptor::list("/v2/expenses", "expenses"),
    EndpointDescriptor::list("/v2/expense_categories", "expense_categories"),
    EndpointDescriptor::list("/v2/invoices", "invoices").with_pdf(),
    EndpointDescriptor::list("/v2/invoice_item_categories", "invoice_item_categories"),
    EndpointDescriptor::list("/v2/estimates", "estimates").with_pdf(),
    EndpointDescriptor::list("/v2/estimate_item_categories", "estimate_item_categories"),
    EndpointDescriptor::list("/v2/roles", "roles"),
    EndpointDescriptor::singleton("/v2/company", "company"),
];

/// Look up an endpoint by resource name
pub fn get_endpoint(name: &str) -> Option<&'static EndpointDescriptor> {
    ENDPOINTS.iter().find(|e| e.name == name)
}

/// Substitute a parent id into a nested path template
pub fn nested_path(template: &str, parent_id: u64) -> String {
    template.replace("{id}", &parent_id.to_string())
}

/// Last path segment of a nested path, used as the file-name suffix
pub fn nested_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
