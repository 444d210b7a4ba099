mod harness;

mod config_loading;
mod consistency;
mod input_faults;
mod outputs;
mod reset;
mod startup;
mod to_test;
mod watchdog;
