use serde::{Deserialize, Serialize};

use super::string_id;

string_id!(SupplierId, "SP");

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierContact {
    pub id: SupplierId,
    pub company_name: String,
    pub contact_name: Option<String>,
    /// Messaging address; may contain formatting characters.
    pub phone: Option<String>,
}

impl SupplierContact {
    /// Name used when greeting the supplier: the salesperson if known, else the company.
    pub fn greeting_name(&self) -> &str {
        self.contact_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.company_name)
    }
}
