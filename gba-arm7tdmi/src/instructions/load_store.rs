// Implementazione istruzioni Load/Store
//
// Queste istruzioni trasferiscono dati tra registri e memoria:
// - LDR/STR: Load/Store word o byte
// - LDRH/STRH, LDRSB/LDRSH: halfword e accessi con segno
// - LDM/STM: Load/Store Multiple (con trasferimento banco User via bit S)
// - SWP: Single Data Swap (lettura+scrittura atomica)

use crate::{cpu::MemoryBus, registers::Registers};

/// Allinea il PC scritto da una load in base allo stato corrente
#[inline]
fn pc_mask(regs: &Registers) -> u32 {
    if regs.is_thumb() {
        !1
    } else {
        !3
    }
}

/// Esegue Single Data Transfer (LDR/STR)
///
/// # Arguments
/// * `regs` - Registri CPU
/// * `bus` - Bus memoria per accesso
/// * `load` - true=LDR, false=STR
/// * `byte` - true=byte, false=word
/// * `pre_index` - Se true, applica offset prima dell'accesso
/// * `add` - Se true, somma offset; se false, sottrai
/// * `writeback` - Se true, scrivi indirizzo finale in Rn
/// * `rn` - Registro base
/// * `rd` - Registro source/dest
/// * `offset` - Offset già risolto (immediato o registro shiftato)
///
/// # Returns
/// Numero di cicli usati
#[allow(clippy::too_many_arguments)]
pub fn execute_single_data_transfer<M: MemoryBus>(
    regs: &mut Registers,
    bus: &mut M,
    load: bool,
    byte: bool,
    pre_index: bool,
    add: bool,
    writeback: bool,
    rn: u8,
    rd: u8,
    offset: u32,
) -> u32 {
    let base = regs.r[rn as usize];
    let offset_base = if add {
        base.wrapping_add(offset)
    } else {
        base.wrapping_sub(offset)
    };

    let address = if pre_index { offset_base } else { base };

    // Writeback prima della scrittura di rd: su LDR con rd==rn vince il
    // valore caricato
    if (writeback || !pre_index) && rn != 15 {
        regs.r[rn as usize] = offset_base;
    }

    if load {
        let value = if byte {
            bus.read_byte(address) as u32
        } else {
            // Il bus allinea e ruota (comportamento ARM7 sugli accessi
            // disallineati)
            bus.read_word(address)
        };

        if rd == 15 {
            regs.set_pc(value & pc_mask(regs));
        } else {
            regs.r[rd as usize] = value;
        }
    } else {
        // STR di R15 scrive PC+12 (il prefetch è già a +8)
        let value = if rd == 15 {
            regs.pc().wrapping_add(4)
        } else {
            regs.r[rd as usize]
        };

        if byte {
            bus.write_byte(address, value as u8);
        } else {
            bus.write_word(address & !3, value);
        }
    }

    // Cicli: 1S + 1N + 1I (load) o 2N (store)
    if load {
        3
    } else {
        2
    }
}

/// Esegue Halfword / Signed Data Transfer (LDRH/STRH/LDRSB/LDRSH)
///
/// `halfword`/`signed` riflettono i bit SH della codifica. LDRSH su
/// indirizzo dispari degrada a LDRSB (comportamento hardware).
#[allow(clippy::too_many_arguments)]
pub fn execute_halfword_transfer<M: MemoryBus>(
    regs: &mut Registers,
    bus: &mut M,
    load: bool,
    signed: bool,
    halfword: bool,
    pre_index: bool,
    add: bool,
    writeback: bool,
    rn: u8,
    rd: u8,
    offset: u32,
) -> u32 {
    let base = regs.r[rn as usize];
    let offset_base = if add {
        base.wrapping_add(offset)
    } else {
        base.wrapping_sub(offset)
    };

    let address = if pre_index { offset_base } else { base };

    if (writeback || !pre_index) && rn != 15 {
        regs.r[rn as usize] = offset_base;
    }

    if load {
        let value = match (signed, halfword) {
            // LDRH: halfword allineata, ruotata nel risultato a 32 bit se
            // l'indirizzo è dispari
            (false, true) => {
                let half = bus.read_halfword(address & !1) as u32;
                half.rotate_right(8 * (address & 1))
            }
            // LDRSB
            (true, false) => bus.read_byte(address) as i8 as i32 as u32,
            // LDRSH: su indirizzo dispari diventa LDRSB
            (true, true) => {
                if address & 1 != 0 {
                    bus.read_byte(address) as i8 as i32 as u32
                } else {
                    bus.read_halfword(address) as i16 as i32 as u32
                }
            }
            (false, false) => unreachable!(),
        };

        if rd == 15 {
            regs.set_pc(value & pc_mask(regs));
        } else {
            regs.r[rd as usize] = value;
        }
        3
    } else {
        // Solo STRH è codificabile in store
        let value = if rd == 15 {
            regs.pc().wrapping_add(4)
        } else {
            regs.r[rd as usize]
        };
        bus.write_halfword(address & !1, value as u16);
        2
    }
}

/// Esegue Block Data Transfer (LDM/STM)
///
/// L'hardware trasferisce sempre dal registro più basso all'indirizzo più
/// basso: le varianti decrementanti si normalizzano calcolando l'indirizzo
/// di partenza e invertendo il pre/post.
///
/// Bit S (`user_mode`):
/// - LDM con R15 nella lista: ripristina il CPSR dall'SPSR
/// - Altrimenti: trasferisce il banco User al posto di quello corrente
///
/// # Returns
/// Numero di cicli usati
#[allow(clippy::too_many_arguments)]
pub fn execute_block_data_transfer<M: MemoryBus>(
    regs: &mut Registers,
    bus: &mut M,
    load: bool,
    pre_index: bool,
    add: bool,
    user_mode: bool,
    writeback: bool,
    rn: u8,
    register_list: u16,
) -> u32 {
    let base = regs.r[rn as usize];
    let count = register_list.count_ones();

    if count == 0 {
        // Lista vuota: nessun trasferimento (il quirk hardware di R15 non
        // viene replicato)
        return 1;
    }

    let pc_in_list = register_list & (1 << 15) != 0;
    let user_bank = user_mode && !(load && pc_in_list);

    // Normalizza a trasferimento ascendente
    let (mut address, pre) = if add {
        (base, pre_index)
    } else {
        (base.wrapping_sub(count * 4), !pre_index)
    };
    let final_base = if add {
        base.wrapping_add(count * 4)
    } else {
        base.wrapping_sub(count * 4)
    };

    // Writeback prima dei trasferimenti: su LDM che include la base vince
    // il valore caricato
    if writeback && rn != 15 {
        regs.r[rn as usize] = final_base;
    }

    let mut cycles = 0;

    for i in 0..16 {
        if register_list & (1 << i) == 0 {
            continue;
        }

        if pre {
            address = address.wrapping_add(4);
        }

        if load {
            let value = bus.read_word(address);
            if i == 15 {
                if user_mode {
                    regs.restore_cpsr();
                }
                regs.set_pc(value & pc_mask(regs));
            } else if user_bank {
                regs.set_user_reg(i, value);
            } else {
                regs.r[i] = value;
            }
        } else {
            let value = if i == 15 {
                regs.pc().wrapping_add(4)
            } else if user_bank {
                regs.user_reg(i)
            } else {
                regs.r[i]
            };
            bus.write_word(address, value);
        }

        if !pre {
            address = address.wrapping_add(4);
        }

        cycles += 1;
    }

    // Cicli: nS + 1N + 1I (LDM) o (n-1)S + 2N (STM)
    if load {
        cycles + 2
    } else {
        cycles + 1
    }
}

/// Esegue Single Data Swap (SWP/SWPB)
///
/// Legge il vecchio valore da [Rn], scrive Rm, deposita il vecchio valore
/// in Rd. Sul bus reale i due accessi sono bloccati insieme.
pub fn execute_swap<M: MemoryBus>(
    regs: &mut Registers,
    bus: &mut M,
    byte: bool,
    rn: u8,
    rd: u8,
    rm: u8,
) -> u32 {
    let address = regs.r[rn as usize];
    let source = regs.r[rm as usize];

    let old = if byte {
        let old = bus.read_byte(address) as u32;
        bus.write_byte(address, source as u8);
        old
    } else {
        let old = bus.read_word(address);
        bus.write_word(address & !3, source);
        old
    };

    if rd == 15 {
        regs.set_pc(old & pc_mask(regs));
    } else {
        regs.r[rd as usize] = old;
    }

    4 // 1S + 2N + 1I
}
