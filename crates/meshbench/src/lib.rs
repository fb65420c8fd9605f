//! `meshbench` measures how efficiently a wireless ad-hoc network delivers traffic. Given a node
//! count, a deployment area, a transmit power, a routing protocol and a traffic intensity, it
//! places the nodes at random, pairs every node with a random peer, runs one constant-bit-rate
//! flow per node through a simulation engine and reports the fraction of transmitted bytes
//! that arrived.

#![warn(unreachable_pub, missing_docs)]

pub mod cli;
pub mod core;
pub mod impls;
