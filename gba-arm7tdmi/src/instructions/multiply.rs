// Implementazione istruzioni di moltiplicazione
//
// - MUL/MLA: moltiplicazione a 32 bit (con accumulo opzionale)
// - UMULL/UMLAL: moltiplicazione unsigned a 64 bit
// - SMULL/SMLAL: moltiplicazione signed a 64 bit
//
// Con bit S vengono aggiornati N e Z; il carry è lasciato inalterato
// (sull'ARM7TDMI il suo valore dopo una MUL non è significativo).

use crate::registers::Registers;

/// Esegue MUL o MLA
pub fn execute_multiply(
    regs: &mut Registers,
    accumulate: bool,
    set_flags: bool,
    rd: u8,
    rn: u8,
    rs: u8,
    rm: u8,
) -> u32 {
    let mut result = regs.r[rm as usize].wrapping_mul(regs.r[rs as usize]);
    if accumulate {
        result = result.wrapping_add(regs.r[rn as usize]);
    }

    regs.r[rd as usize] = result;

    if set_flags {
        regs.set_flag_n(result >> 31 != 0);
        regs.set_flag_z(result == 0);
    }

    // 1S + mI, approssimato
    if accumulate {
        3
    } else {
        2
    }
}

/// Esegue UMULL/UMLAL/SMULL/SMLAL
#[allow(clippy::too_many_arguments)]
pub fn execute_multiply_long(
    regs: &mut Registers,
    signed: bool,
    accumulate: bool,
    set_flags: bool,
    rd_hi: u8,
    rd_lo: u8,
    rs: u8,
    rm: u8,
) -> u32 {
    let rm_value = regs.r[rm as usize];
    let rs_value = regs.r[rs as usize];

    let mut result = if signed {
        (rm_value as i32 as i64).wrapping_mul(rs_value as i32 as i64) as u64
    } else {
        (rm_value as u64).wrapping_mul(rs_value as u64)
    };

    if accumulate {
        let acc = ((regs.r[rd_hi as usize] as u64) << 32) | (regs.r[rd_lo as usize] as u64);
        result = result.wrapping_add(acc);
    }

    regs.r[rd_lo as usize] = result as u32;
    regs.r[rd_hi as usize] = (result >> 32) as u32;

    if set_flags {
        regs.set_flag_n(result >> 63 != 0);
        regs.set_flag_z(result == 0);
    }

    // 1S + (m+1)I, approssimato
    if accumulate {
        5
    } else {
        4
    }
}
