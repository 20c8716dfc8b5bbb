mod conflict_tests;
mod fixture;
mod registry_tests;
mod repair_tests;
