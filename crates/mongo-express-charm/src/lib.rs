//! Operator charm running the mongo-express web UI next to a MongoDB deployment.
//!
//! Every unit renders a Pebble layer from the charm config and a web password shared by all
//! units of the application. The leader generates the password once and distributes it through
//! the `cluster` peer relation, the other units pick it up when the relation data changes.
//!
//! The hosting runtime is reached through three seams: [`supervisor::Supervisor`],
//! [`peer::PeerRelation`] and [`leadership::Leadership`]. [`unit::Unit`] wires them to the
//! [`reconcile::Reconciler`].
pub mod actions;
pub mod cli;
pub mod config;
pub mod leadership;
pub mod logging;
pub mod peer;
pub mod reconcile;
pub mod secret;
pub mod status;
pub mod supervisor;
pub mod unit;
pub mod validation;
