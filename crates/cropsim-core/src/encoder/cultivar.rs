// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cultivar genetics file (`{cultivar}.var`).

use super::InputFile;
use super::record::{Col, F14_6, I14, RecordWriter, cell};
use crate::catalog::Cultivar;
use crate::crop::Crop;
use crate::error::{Error, Result};

/// Root uptake, root mover and nitrogen uptake parameters.
struct RootSection {
    uptake: [f64; 3],
    alp: [f64; 4],
    epsi: f64,
    iupw: i64,
    cour_max: f64,
    diffusion: [f64; 3],
    isink: i64,
    rroot: f64,
    const_m: [f64; 3],
    const_y: [f64; 3],
}

impl RootSection {
    /// The 21 root parameters starting at `base` in a cultivar vector.
    fn at(p: &[f64], base: usize) -> Self {
        let s = &p[base..base + 21];
        Self {
            uptake: [s[0], s[1], s[2]],
            alp: [s[3], s[4], s[5], s[6]],
            epsi: s[7],
            iupw: s[8] as i64,
            cour_max: s[9],
            diffusion: [s[10], s[11], s[12]],
            isink: s[13] as i64,
            rroot: s[14],
            const_m: [s[15], s[16], s[17]],
            const_y: [s[18], s[19], s[20]],
        }
    }

    fn cotton() -> Self {
        Self {
            uptake: [166.7, 31.3, 0.73],
            alp: [0.6, 0.3, 0.00001, 0.0002],
            epsi: 1.0,
            iupw: 1,
            cour_max: 1.0,
            diffusion: [2.4, 2.9, 0.0],
            isink: 1,
            rroot: 0.03,
            const_m: [35.0, 0.5, 0.01],
            const_y: [17.2, 0.75, 0.03],
        }
    }

    fn write(&self, w: &mut RecordWriter) {
        w.line("[SoilRoot]")
            .line("*** WATER UPTAKE PARAMETER INFORMATION **************************")
            .line("RRRM       RRRY    RVRL")
            .uniform(&self.uptake, F14_6)
            .line(" ALPM    ALPY     RTWL    RtMinWtPerUnitArea")
            .uniform(&self.alp, Col::right(14, 8))
            .line("[RootDiff]")
            .line("*** ROOT MOVER PARAMETER INFORMATION **************************")
            .line("EPSI        lUpW             CourMax")
            .cells(&[
                cell(self.epsi, F14_6),
                cell(self.iupw, I14),
                cell(self.cour_max, F14_6),
            ])
            .line("Diffusivity and geotropic velocity")
            .uniform(&self.diffusion, F14_6)
            .line("[SoilNitrogen]")
            .line("*** NITROGEN ROOT UPTAKE PARAMETER INFORMATION **************************")
            .line("ISINK    Rroot         ")
            .cells(&[cell(self.isink, I14), cell(self.rroot, F14_6)])
            .line("ConstI   Constk     Cmin0 ")
            .uniform(&self.const_m, F14_6)
            .uniform(&self.const_y, F14_6);
    }
}

/// Number of positional parameters each crop's layout reads.
pub fn parameter_count(crop: Crop) -> usize {
    match crop {
        Crop::Maize => 28,
        Crop::Potato => 30,
        Crop::Soybean => 48,
        Crop::Cotton => 35,
        Crop::Fallow => 0,
    }
}

pub(crate) fn cultivar_file(cultivar: &Cultivar) -> Result<InputFile> {
    let crop = cultivar.crop;
    let name = &cultivar.name;
    let p = &cultivar.parameters;
    let needed = parameter_count(crop);
    if p.len() < needed {
        return Err(Error::config(format!(
            "cultivar '{name}' has {} parameters, {crop} needs {needed}",
            p.len()
        )));
    }

    let mut w = RecordWriter::new();
    let root = match crop {
        Crop::Maize => {
            w.line(format!("maize growth simulation for variety {name}"))
                .line("Juvenile   Daylength   StayGreen  LM_Min Rmax_LTAR          Rmax_LTIR          Phyllochrons from ")
                .line("leaves     Sensitive   Leaf tip appearance   Leaf tip initiation       TassellInit")
                .cells(&[
                    cell(p[0], Col::bare(6)),
                    cell(p[1], Col::right(14, 0)),
                    cell(p[5], F14_6),
                    cell(p[6], F14_6),
                    cell(p[2], F14_6),
                    cell(p[3], F14_6),
                    cell(p[4], F14_6),
                ]);
            RootSection::at(p, 7)
        }
        Crop::Potato => {
            let a2 = (p[0] - 1.0) / 10.0;
            let a5 = p[1] - 1.0;
            let a7 = p[2] - 1.0;
            w.line("*** EX4 Coefficient Calibration for Agmip 2017")
                .line(name)
                .line("Genetic Coefficients")
                .line("A1(T1) A2(T2) A3(LAI) A4(Srad) A5(Tamp) A6(Tamp) A7(Pd) A8(Pd) A9(N) A10(N) G1(Det) G2(Exp) G3(TGR) G4(SLW)")
                .uniform(
                    &[
                        p[0], a2, 100.0, 1.0, a5, p[1], a7, p[2], p[3], p[4], p[5], p[6], p[7],
                        p[8],
                    ],
                    Col::right(14, 3),
                );
            RootSection::at(p, 9)
        }
        Crop::Soybean => {
            w.line(format!("soybean growth simulation for variety {name}"))
                .line("[Phenology]")
                .line(
                    "MG SEEDLB FILL PARM(2) PARM(3) PARM(4) PARM(5) PARM(6) PARM(7) PARM(8) PARM(9) PARM(10) PARM(11) \
                     PARM(12) PARM(13) PARM(14) PARM(15) PARM(16) PARM(17) PARM(18) PARM(19) PARM(20) PARM(21) PARM(22) \
                     PARM(23) PARM(24) PARM(25)",
                )
                .uniform(&p[..27], Col::right(14, 5));
            RootSection::at(p, 27)
        }
        Crop::Cotton => {
            w.line(format!("Cotton growth simulation for variety {name}"))
                .line("[Phenology]")
                .line(name)
                .uniform(&cotton_calibration(p), F14_6);
            RootSection::cotton()
        }
        Crop::Fallow => {
            return Err(Error::config(format!(
                "cultivar '{name}': fallow runs use the stored fallow.var"
            )));
        }
    };
    root.write(&mut w);
    write_gas_exchange(&mut w, crop);

    Ok(InputFile::new(format!("{name}.var"), w.finish()))
}

/// The 60 calibration values of a cotton cultivar: fixed constants
/// interleaved with the cultivar's 35 parameters.
fn cotton_calibration(p: &[f64]) -> Vec<f64> {
    let mut v = vec![0.9, -0.22, -2.2, 0.1, -5.5, 0.5, 0.5, 0.1, 1.65, 2.15];
    v.extend_from_slice(&p[0..3]);
    v.push(0.1);
    v.extend_from_slice(&p[3..8]);
    v.extend_from_slice(&[1.0, 1.0]);
    v.push(p[8]);
    v.extend_from_slice(&[1.0, 1.0, 1.0]);
    v.extend_from_slice(&p[9..29]);
    v.push(1.0);
    v.extend_from_slice(&p[29..33]);
    v.push(1.0);
    v.push(p[33]);
    v.extend_from_slice(&[1.0, 0.0, 0.9, 1.0]);
    v.push(p[34]);
    v.extend_from_slice(&[1.0, 1.0, 1.0]);
    v
}

fn write_gas_exchange(w: &mut RecordWriter, crop: Crop) {
    w.line("[Gas_Exchange Species Parameters] ")
        .line("**** for photosynthesis calculations ***")
        .line("EaVp    EaVc    Eaj     Hj      Sj     Vpm25   Vcm25    Jm25    Rd25    Ear       g0    g1")
        .line("75100   55900   32800   220000  702.6   70      50       300    2       39800   0.017   4.53")
        .line("*** Second set of parameters for Photosynthesis ****")
        .line("f (spec_correct)     scatt  Kc25    Ko25    Kp25    gbs         gi      gamma1")
        .line("0.15                 0.15   650      450    80      0.003       1       0.193")
        .line("**** Third set of photosynthesis parameters ****")
        .line("Gamma_gsw  sensitivity (sf) Reference_Potential_(phyla, bars) stomaRatio widthFact lfWidth (m)")
        .line("  10.0        2.3               -1.2                             1.0        0.72   0.050")
        .line("**** Secondary parameters for miscelanious equations ****")
        .line("internal_CO2_Ratio   SC_param      BLC_param")
        .line("0.7                   1.57           1.36");
    if matches!(crop, Crop::Maize | Crop::Soybean | Crop::Cotton) {
        w.line("***** Q10 parameters for respiration and leaf senescence")
            .line("Q10MR            Q10LeafSenescense")
            .line("2.0                     2.0")
            .line("**** parameters for calculating the rank of the largest leaf and potential length of the leaf based on rank")
            .line("leafNumberFactor_a1 leafNumberFactor_b1 leafNumberFactor_a2 leafNumberFactor_b2")
            .line("-10.61                   0.25                   -5.99           0.27")
            .line("**************Leaf Morphology Factors *************")
            .line("LAF        WLRATIO         A_LW")
            .line(" 1.37          0.106           0.75")
            .line("*******************Temperature factors for growth *****************************")
            .line("T_base                 T_opt            t_ceil  t_opt_GDD")
            .line("8.0                   32.1              43.7       34.0");
    }
    w.line("");
}
