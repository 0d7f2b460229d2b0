// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound commands and their validation.
//!
//! Callers address a device with an [`ActorRequest`] carrying a perform
//! name and a JSON parameter. Before anything reaches the network the
//! device validates the arguments into a [`ValidationReport`]; a report
//! that is not empty rejects the perform.

mod request;
mod validation;

pub use request::{ActorRequest, RequestKind};
pub use validation::{
    Params, ValidationReport, optional_number, optional_text, parse_optional_params, parse_params,
    require_text,
};
