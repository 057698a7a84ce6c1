//! End-to-end pipeline tests against scripted collaborators.
