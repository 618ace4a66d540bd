use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
  pub id: i32,
  pub name: String,
  pub location: Option<String>,
  /// Employee id; not enforced as a foreign key
  pub manager_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDepartment {
  pub name: String,
  #[serde(default)]
  pub location: Option<String>,
  #[serde(default)]
  pub manager_id: Option<i32>,
}

impl NewDepartment {
  pub fn into_department(self, id: i32) -> Department {
    Department {
      id,
      name: self.name,
      location: self.location,
      manager_id: self.manager_id,
    }
  }
}
