// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Irrigation file (`{site}.irr`).

use super::InputFile;
use super::record::RecordWriter;
use crate::timeline::{Action, Irrigation, Timeline};

pub(crate) fn irrigation_file(site: &str, timeline: &Timeline) -> InputFile {
    let mut sprinkler = Vec::new();
    let mut by_depth = Vec::new();
    let mut by_rate = Vec::new();
    for op in &timeline.operations {
        let Action::Irrigation(irrigation) = &op.action else {
            continue;
        };
        match irrigation {
            Irrigation::Sprinkler { amount } => {
                sprinkler.push(format!("'{:<10}'      {amount:>14}", op.date));
            }
            Irrigation::FloodDepth {
                pond_depth,
                start_date,
                start_hour,
                stop_date,
                stop_hour,
            } => by_depth.push(format!(
                "{pond_depth:>10.2}      '{start_date:<14}'         {start_hour:<14}         '{stop_date:<14}'         {stop_hour:<14}"
            )),
            Irrigation::FloodRate {
                pond_depth,
                rate,
                start_date,
                start_hour,
                stop_date,
                stop_hour,
            } => by_rate.push(format!(
                "{pond_depth:>10.2}      {rate:>14}       '{start_date:<14}'        {start_hour:<14}         '{stop_date:<14}'         {stop_hour:<14}"
            )),
        }
    }

    let mut w = RecordWriter::new();
    w.line("**** Script for irrigation")
        .line("[Sprinkler]")
        .line("Sprinkler irrigation")
        .line("Average irrigation rate (cm/hour)")
        .line("3")
        .line("Number of irrigation application");
    block(&mut w, &sprinkler, "Date             AmtIrrAppl (mm/day)", "No Irrigation");

    w.line("[Flood_H]")
        .line("Flood irrigation as depth of water (cm)")
        .line("Number of flood irrigations as head (cm)");
    block(
        &mut w,
        &by_depth,
        "Ponding Depth (cm)        Irrigation start date         and  hour/         Irrigation stop date         and hour/ -          one line for each application",
        "No flood Irrigation",
    );

    w.line("[Flood_R]")
        .line("Flood irrigation as rate applied (cm/day)")
        .line("Number of flood irrigations as rate");
    block(
        &mut w,
        &by_rate,
        "Ponding Depth (cm)       rate (cm/day)     Irrigation start date        and  hour/             Irrigation stop date        and hour/ -          one line for each application",
        "No flood Irrigation",
    );

    InputFile::new(format!("{site}.irr"), w.finish())
}

fn block(w: &mut RecordWriter, rows: &[String], header: &str, empty: &str) {
    if rows.is_empty() {
        w.line("0").line(empty);
        return;
    }
    w.line(format!("{:5}", rows.len())).line(header);
    for row in rows {
        w.line(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Operation;

    #[test]
    fn test_no_irrigation() {
        let file = irrigation_file("Site", &Timeline::default());
        assert_eq!(file.name, "Site.irr");
        assert_eq!(file.contents.matches("\n0\n").count(), 3);
        assert!(file.contents.contains("0\nNo Irrigation\n[Flood_H]"));
    }

    #[test]
    fn test_sprinkler_rows() {
        let timeline = Timeline::new(vec![Operation {
            date: "06/15/2024".into(),
            action: Action::Irrigation(Irrigation::Sprinkler { amount: 25 }),
        }]);
        let file = irrigation_file("Site", &timeline);
        assert!(file.contents.contains("    1\nDate             AmtIrrAppl (mm/day)\n'06/15/2024'                  25\n"));
    }
}
