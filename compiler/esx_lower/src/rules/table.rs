//! The intrinsic rewrite table.

use super::{a, a_si, ai1, bo, c16, c32, c64, l, nbs, nk, t, u, Rule, SLM_BTI};

/// All rewrite rules, keyed by source spelling without the `__esimd_` prefix.
pub static RULES: &[Rule] = &[
    // Region access
    Rule::new("rdregion", "rdregion", &[a(0), t(3), t(4), t(5), a(1), t(6)]).with_suffix(nk(-1)),
    Rule::new(
        "wrregion",
        "wrregion",
        &[a(0), a(1), t(3), t(4), t(5), a(2), t(6), ai1(3)],
    )
    .with_suffix(nk(-1)),
    Rule::new("vload", "vload", &[l(0)]),
    Rule::new("vstore", "vstore", &[a(1), a(0)]),
    // Shared virtual memory
    Rule::new("flat_block_read_unaligned", "svm.block.ld.unaligned", &[l(0)]),
    Rule::new("flat_block_write", "svm.block.st", &[l(1)]),
    Rule::new("flat_read", "svm.gather", &[ai1(2), a(1), a(0), u(-1)]),
    Rule::new(
        "flat_read4",
        "svm.gather4.scaled",
        &[ai1(1), t(2), c16(0), c64(0), a(0), u(-1)],
    ),
    Rule::new("flat_write", "svm.scatter", &[ai1(3), a(2), a(0), a(1)]),
    Rule::new(
        "flat_write4",
        "svm.scatter4.scaled",
        &[ai1(2), t(2), c16(0), c64(0), a(0), a(1)],
    ),
    // Surfaces
    Rule::new("surf_read", "gather.scaled2", &[t(3), c16(0), a_si(1), a(2), a(3)]),
    Rule::new(
        "surf_write",
        "scatter.scaled",
        &[ai1(0), t(3), c16(0), a_si(2), a(3), a(4), a(5)],
    ),
    // Work-item queries
    Rule::new("group_id_x", "group.id.x", &[]),
    Rule::new("group_id_y", "group.id.y", &[]),
    Rule::new("group_id_z", "group.id.z", &[]),
    Rule::new("local_id", "local.id", &[]),
    Rule::new("local_size", "local.size", &[]),
    // SVM atomics
    Rule::new("flat_atomic0", "svm.atomic", &[ai1(1), a(0), u(-1)]).with_suffix(bo(0)),
    Rule::new("flat_atomic1", "svm.atomic", &[ai1(2), a(0), a(1), u(-1)]).with_suffix(bo(0)),
    Rule::new("flat_atomic2", "svm.atomic", &[ai1(3), a(0), a(1), a(2), u(-1)])
        .with_suffix(bo(0)),
    // Reductions
    Rule::new("reduced_fmax", "fmax", &[a(0), a(1)]),
    Rule::new("reduced_umax", "umax", &[a(0), a(1)]),
    Rule::new("reduced_smax", "smax", &[a(0), a(1)]),
    Rule::new("reduced_fmin", "fmin", &[a(0), a(1)]),
    Rule::new("reduced_umin", "umin", &[a(0), a(1)]),
    Rule::new("reduced_smin", "smin", &[a(0), a(1)]),
    Rule::new("dp4", "dp4", &[a(0), a(1)]),
    // Media blocks
    Rule::new(
        "media_block_load",
        "media.ld",
        &[a(0), a_si(1), a(2), a(3), a(4), a(5)],
    ),
    Rule::new(
        "media_block_store",
        "media.st",
        &[a(0), a_si(1), a(2), a(3), a(4), a(5), a(6)],
    ),
    // Synchronization
    Rule::new("slm_fence", "fence", &[a(0)]),
    Rule::new("barrier", "barrier", &[]),
    // Oword blocks
    Rule::new("block_read", "oword.ld.unaligned", &[c32(0), a_si(0), a(1)]),
    Rule::new("block_write", "oword.st", &[a_si(0), a(1), a(2)]),
    // Shared local memory
    Rule::new("slm_block_read", "oword.ld.unaligned", &[c32(0), c32(SLM_BTI), a(0)]),
    Rule::new("slm_block_write", "oword.st", &[c32(SLM_BTI), a(0), a(1)]),
    Rule::new(
        "slm_read",
        "gather.scaled",
        &[ai1(1), nbs(-1), c16(0), c32(SLM_BTI), c32(0), a(0), u(-1)],
    ),
    Rule::new(
        "slm_read4",
        "gather4.scaled",
        &[ai1(1), t(2), c16(0), c32(SLM_BTI), c32(0), a(0), u(-1)],
    ),
    Rule::new(
        "slm_write",
        "scatter.scaled",
        &[ai1(2), nbs(1), c16(0), c32(SLM_BTI), c32(0), a(0), a(1)],
    ),
    Rule::new(
        "slm_write4",
        "scatter4.scaled",
        &[ai1(2), t(2), c16(0), c32(SLM_BTI), c32(0), a(0), a(1)],
    ),
    Rule::new("slm_atomic0", "dword.atomic", &[ai1(1), c32(SLM_BTI), a(0), u(-1)])
        .with_suffix(bo(0)),
    Rule::new(
        "slm_atomic1",
        "dword.atomic",
        &[ai1(2), c32(SLM_BTI), a(0), a(1), u(-1)],
    )
    .with_suffix(bo(0)),
    Rule::new(
        "slm_atomic2",
        "dword.atomic",
        &[ai1(3), c32(SLM_BTI), a(0), a(1), a(2), u(-1)],
    )
    .with_suffix(bo(0)),
    // Raw sends
    Rule::new(
        "raw_sends_load",
        "raw.sends2",
        &[
            a(0),
            a(1),
            ai1(2),
            a(3),
            a(4),
            a(5),
            a(6),
            a(7),
            a(8),
            a(9),
            a(10),
            a(11),
        ],
    ),
    Rule::new(
        "raw_send_load",
        "raw.send2",
        &[a(0), a(1), ai1(2), a(3), a(4), a(5), a(6), a(7), a(8), a(9)],
    ),
    Rule::new(
        "raw_sends_store",
        "raw.sends2.noresult",
        &[a(0), a(1), ai1(2), a(3), a(4), a(5), a(6), a(7), a(8), a(9)],
    ),
    Rule::new(
        "raw_send_store",
        "raw.send2.noresult",
        &[a(0), a(1), ai1(2), a(3), a(4), a(5), a(6), a(7)],
    ),
    // Saturating conversions
    Rule::new("satf", "sat", &[a(0)]),
    Rule::new("fptoui_sat", "fptoui.sat", &[a(0)]),
    Rule::new("fptosi_sat", "fptosi.sat", &[a(0)]),
    Rule::new("uutrunc_sat", "uutrunc.sat", &[a(0)]),
    Rule::new("ustrunc_sat", "ustrunc.sat", &[a(0)]),
    Rule::new("sutrunc_sat", "sutrunc.sat", &[a(0)]),
    Rule::new("sstrunc_sat", "sstrunc.sat", &[a(0)]),
    // Integer arithmetic
    Rule::new("abs", "abs", &[a(0)]).with_suffix(nk(-1)),
    Rule::new("ssshl", "ssshl", &[a(0), a(1)]),
    Rule::new("sushl", "sushl", &[a(0), a(1)]),
    Rule::new("usshl", "usshl", &[a(0), a(1)]),
    Rule::new("uushl", "uushl", &[a(0), a(1)]),
    Rule::new("ssshl_sat", "ssshl.sat", &[a(0), a(1)]),
    Rule::new("sushl_sat", "sushl.sat", &[a(0), a(1)]),
    Rule::new("usshl_sat", "usshl.sat", &[a(0), a(1)]),
    Rule::new("uushl_sat", "uushl.sat", &[a(0), a(1)]),
    Rule::new("rol", "rol", &[a(0), a(1)]),
    Rule::new("ror", "ror", &[a(0), a(1)]),
    Rule::new("umulh", "umulh", &[a(0), a(1)]),
    Rule::new("smulh", "smulh", &[a(0), a(1)]),
    Rule::new("frc", "frc", &[a(0)]),
    Rule::new("fmax", "fmax", &[a(0), a(1)]),
    Rule::new("umax", "umax", &[a(0), a(1)]),
    Rule::new("smax", "smax", &[a(0), a(1)]),
    Rule::new("fmin", "fmin", &[a(0), a(1)]),
    Rule::new("umin", "umin", &[a(0), a(1)]),
    Rule::new("smin", "smin", &[a(0), a(1)]),
    // Bit manipulation
    Rule::new("lzd", "lzd", &[a(0)]),
    Rule::new("bfrev", "bfrev", &[a(0)]),
    Rule::new("cbit", "cbit", &[a(0)]),
    Rule::new("bfins", "bfi", &[a(0), a(1), a(2), a(3)]),
    Rule::new("bfext", "sbfe", &[a(0), a(1), a(2)]),
    Rule::new("fbl", "fbl", &[a(0)]),
    Rule::new("sfbh", "sfbh", &[a(0)]),
    Rule::new("ufbh", "ufbh", &[a(0)]),
    // Math
    Rule::new("inv", "inv", &[a(0)]),
    Rule::new("log", "log", &[a(0)]),
    Rule::new("exp", "exp", &[a(0)]),
    Rule::new("sqrt", "sqrt", &[a(0)]),
    Rule::new("sqrt_ieee", "ieee.sqrt", &[a(0)]),
    Rule::new("rsqrt", "rsqrt", &[a(0)]),
    Rule::new("sin", "sin", &[a(0)]),
    Rule::new("cos", "cos", &[a(0)]),
    Rule::new("pow", "pow", &[a(0), a(1)]),
    Rule::new("div_ieee", "ieee.div", &[a(0), a(1)]),
    Rule::new("dp4a", "dp4a", &[a(0), a(1), a(2)]),
    // Predicates
    Rule::new("any", "any", &[ai1(0)]),
    Rule::new("all", "all", &[ai1(0)]),
];
