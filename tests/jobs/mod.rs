//! Job lifecycle behaviour modules.

mod bdd_steps;
mod concurrent_waits;
mod scenarios;
mod test_doubles;
mod test_helpers;
