// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Biology defaults and drip irrigation stub.

use super::InputFile;
use super::record::{F14_6, RecordWriter};
use crate::catalog::BiologyDefaults;

pub(crate) fn biology_file(bio: &BiologyDefaults) -> InputFile {
    let mut w = RecordWriter::new();
    w.line("*** Example 12.3: Parameters of abiotic response: file 'SetAbio.dat'")
        .line("Dehumification, mineralization, nitrification dependencies on moisture:")
        .line("dThH    dThL    es    Th_m")
        .uniform(&[bio.dth_h, bio.dth_l, bio.es, bio.th_m], F14_6)
        .line("Dependencies of temperature")
        .line("tb     QT")
        .uniform(&[bio.tb, bio.qt], F14_6)
        .line("Denitrification dependencies on water content")
        .line("dThD   Th_d")
        .uniform(&[bio.dth_d, bio.th_d], F14_6);
    InputFile::new("BiologyDefault.bio", w.finish())
}

pub(crate) fn drip_file(site: &str) -> InputFile {
    let mut w = RecordWriter::new();
    w.line("*****Script for Drip application module ***** mAppl is cm water per hour to a 45 x 30 cm area")
        .line("Number of Drip irrigations(max=25)")
        .line("0")
        .line("No drip irrigation");
    InputFile::new(format!("{site}.drp"), w.finish())
}
