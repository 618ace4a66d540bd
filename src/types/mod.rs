mod department;
mod employee;
mod report;

pub use department::{Department, NewDepartment};
pub use employee::{Employee, NewEmployee};
pub use report::{HireYearCount, SalaryStats};
