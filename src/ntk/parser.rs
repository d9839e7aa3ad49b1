use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use crate::{Ntk, NtkEdge, Result, ntk::error::ParserError};

fn io_err(e: std::io::Error) -> ParserError {
    ParserError::Io(e.to_string())
}

/// Reader for the ISCAS BENCH format.
///
/// Gates are elaborated into strashed AND gates with complemented edges:
/// NOT/BUF fold into edge polarity, OR/NAND/NOR/XOR/XNOR decompose into ANDs.
/// N-ary gates are folded left to right.
mod bench {
    use std::collections::{HashMap, HashSet};
    use std::io::BufRead;

    use indexmap::IndexMap;

    use crate::{Ntk, NtkEdge, Result, ntk::error::ParserError};

    struct GateDef {
        gate: String,
        args: Vec<String>,
    }

    pub(super) struct Builder {
        ntk: Ntk,
        defs: IndexMap<String, GateDef>,
        resolved: HashMap<String, NtkEdge>,
        in_progress: HashSet<String>,
    }

    /// Extract `name` from a token like `INPUT(name)`.
    fn inside_parens(line: &str) -> Result<String> {
        let open = line.find('(');
        let close = line.rfind(')');
        match (open, close) {
            (Some(o), Some(c)) if o < c => {
                let name = line[o + 1..c].trim();
                if name.is_empty() {
                    Err(ParserError::InvalidToken(format!("empty signal in '{}'", line)).into())
                } else {
                    Ok(name.to_string())
                }
            }
            _ => Err(ParserError::InvalidToken(format!("malformed line '{}'", line)).into()),
        }
    }

    fn parse_gate_line(line: &str) -> Result<(String, GateDef)> {
        let (lhs, rhs) = line
            .split_once('=')
            .ok_or_else(|| ParserError::InvalidToken(format!("expected '=' in '{}'", line)))?;
        let name = lhs.trim().to_string();
        let rhs = rhs.trim();
        let open = rhs
            .find('(')
            .ok_or_else(|| ParserError::InvalidToken(format!("expected '(' in '{}'", line)))?;
        let close = rhs
            .rfind(')')
            .ok_or_else(|| ParserError::InvalidToken(format!("expected ')' in '{}'", line)))?;
        let gate = rhs[..open].trim().to_ascii_uppercase();
        let args: Vec<String> = rhs[open + 1..close]
            .split(',')
            .map(|a| a.trim().to_string())
            .collect();
        if name.is_empty() || args.iter().any(|a| a.is_empty()) {
            return Err(ParserError::InvalidToken(format!("malformed gate '{}'", line)).into());
        }
        Ok((name, GateDef { gate, args }))
    }

    impl Builder {
        pub(super) fn parse(reader: impl BufRead) -> Result<Ntk> {
            let mut builder = Builder {
                ntk: Ntk::with_name("top"),
                defs: IndexMap::new(),
                resolved: HashMap::new(),
                in_progress: HashSet::new(),
            };
            let mut outputs: Vec<String> = Vec::new();

            for line in reader.lines() {
                let line = line.map_err(super::io_err)?;
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let upper = line.to_ascii_uppercase();
                if upper.starts_with("INPUT(") {
                    let name = inside_parens(line)?;
                    let input = builder.ntk.add_input(&name)?;
                    builder
                        .resolved
                        .insert(name, NtkEdge::new(input, false));
                } else if upper.starts_with("OUTPUT(") {
                    outputs.push(inside_parens(line)?);
                } else {
                    let (name, def) = parse_gate_line(line)?;
                    builder.defs.insert(name, def);
                }
            }

            // Elaborate every definition, dangling cones included.
            let names: Vec<String> = builder.defs.keys().cloned().collect();
            for name in names {
                builder.resolve(&name)?;
            }
            for name in outputs {
                let edge = builder.resolve(&name)?;
                builder.ntk.add_output(&name, edge)?;
            }

            builder.ntk.check_integrity()?;
            Ok(builder.ntk)
        }

        fn resolve(&mut self, name: &str) -> Result<NtkEdge> {
            if let Some(edge) = self.resolved.get(name) {
                return Ok(edge.clone());
            }
            if !self.defs.contains_key(name) {
                return Err(ParserError::UndefinedSignal(name.to_string()).into());
            }
            if !self.in_progress.insert(name.to_string()) {
                return Err(ParserError::InvalidToken(format!(
                    "combinational loop through '{}'",
                    name
                ))
                .into());
            }

            let (gate, args) = {
                let def = &self.defs[name];
                (def.gate.clone(), def.args.clone())
            };
            let mut fanins = Vec::with_capacity(args.len());
            for arg in &args {
                fanins.push(self.resolve(arg)?);
            }
            if fanins.is_empty() {
                return Err(
                    ParserError::InvalidToken(format!("gate '{}' has no operand", name)).into(),
                );
            }

            // Gates are created unnamed on purpose: a NAND elaborates into the
            // complement of an AND gate, and naming that gate after the signal
            // would alias the signal with its own inversion on write-out.
            let edge = match gate.as_str() {
                "AND" => self.fold_and(fanins)?,
                "NAND" => !self.fold_and(fanins)?,
                "OR" => !self.fold_and(fanins.into_iter().map(|e| !e).collect())?,
                "NOR" => self.fold_and(fanins.into_iter().map(|e| !e).collect())?,
                "NOT" => {
                    self.expect_unary(name, &fanins)?;
                    !fanins[0].clone()
                }
                "BUF" | "BUFF" => {
                    self.expect_unary(name, &fanins)?;
                    fanins[0].clone()
                }
                "XOR" => self.fold_xor(fanins)?,
                "XNOR" => !self.fold_xor(fanins)?,
                other => {
                    return Err(
                        ParserError::UnsupportedFeature(format!("gate type '{}'", other)).into(),
                    );
                }
            };

            self.in_progress.remove(name);
            self.resolved.insert(name.to_string(), edge.clone());
            Ok(edge)
        }

        fn expect_unary(&self, name: &str, fanins: &[NtkEdge]) -> Result<()> {
            if fanins.len() == 1 {
                Ok(())
            } else {
                Err(ParserError::InvalidToken(format!(
                    "gate '{}' expects a single operand, got {}",
                    name,
                    fanins.len()
                ))
                .into())
            }
        }

        fn fold_and(&mut self, fanins: Vec<NtkEdge>) -> Result<NtkEdge> {
            let mut acc = fanins[0].clone();
            for fanin in fanins.into_iter().skip(1) {
                acc = self.ntk.new_and(None, acc, fanin)?;
            }
            Ok(acc)
        }

        fn fold_xor(&mut self, fanins: Vec<NtkEdge>) -> Result<NtkEdge> {
            let mut acc = fanins[0].clone();
            for fanin in fanins.into_iter().skip(1) {
                // a ^ b = !(!(a·!b) · !(!a·b))
                let left = self.ntk.new_and(None, acc.clone(), !fanin.clone())?;
                let right = self.ntk.new_and(None, !acc, fanin)?;
                acc = !self.ntk.new_and(None, !left, !right)?;
            }
            Ok(acc)
        }
    }
}

/// Reader for the combinational BLIF subset.
///
/// `.names` covers are restricted to on-set rows (output bit `1`); rows are
/// OR-ed products. `.latch` is a hard error: the engine only deals with
/// combinational netlists.
mod blif {
    use std::collections::{HashMap, HashSet};
    use std::io::BufRead;

    use indexmap::IndexMap;

    use crate::{Ntk, NtkEdge, Result, ntk::error::ParserError};

    struct CoverDef {
        inputs: Vec<String>,
        rows: Vec<String>,
    }

    pub(super) struct Builder {
        ntk: Ntk,
        defs: IndexMap<String, CoverDef>,
        resolved: HashMap<String, NtkEdge>,
        in_progress: HashSet<String>,
    }

    /// Read logical lines: strip comments, merge `\` continuations.
    fn logical_lines(reader: impl BufRead) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let mut pending = String::new();
        for line in reader.lines() {
            let line = line.map_err(super::io_err)?;
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => &line[..],
            };
            let line = line.trim_end();
            if let Some(stripped) = line.strip_suffix('\\') {
                pending.push_str(stripped);
                pending.push(' ');
                continue;
            }
            pending.push_str(line);
            let full = pending.trim().to_string();
            pending.clear();
            if !full.is_empty() {
                lines.push(full);
            }
        }
        if !pending.trim().is_empty() {
            lines.push(pending.trim().to_string());
        }
        Ok(lines)
    }

    impl Builder {
        pub(super) fn parse(reader: impl BufRead) -> Result<Ntk> {
            let lines = logical_lines(reader)?;

            let mut model = "top".to_string();
            let mut input_names: Vec<String> = Vec::new();
            let mut output_names: Vec<String> = Vec::new();
            let mut defs: IndexMap<String, CoverDef> = IndexMap::new();
            let mut current: Option<String> = None;

            for line in &lines {
                if let Some(rest) = line.strip_prefix('.') {
                    current = None;
                    let mut tokens = rest.split_whitespace();
                    let directive = tokens.next().unwrap_or("");
                    let args: Vec<String> = tokens.map(str::to_string).collect();
                    match directive {
                        "model" => {
                            if let Some(name) = args.first() {
                                model = name.clone();
                            }
                        }
                        "inputs" => input_names.extend(args),
                        "outputs" => output_names.extend(args),
                        "names" => {
                            if args.is_empty() {
                                return Err(ParserError::InvalidToken(
                                    ".names with no signal".to_string(),
                                )
                                .into());
                            }
                            let output = args.last().unwrap().clone();
                            let inputs = args[..args.len() - 1].to_vec();
                            defs.insert(
                                output.clone(),
                                CoverDef {
                                    inputs,
                                    rows: Vec::new(),
                                },
                            );
                            current = Some(output);
                        }
                        "end" => break,
                        "latch" => {
                            return Err(ParserError::UnsupportedFeature(
                                "sequential element (.latch)".to_string(),
                            )
                            .into());
                        }
                        other => {
                            return Err(ParserError::UnsupportedFeature(format!(
                                "directive .{}",
                                other
                            ))
                            .into());
                        }
                    }
                } else {
                    match &current {
                        Some(output) => defs[output].rows.push(line.clone()),
                        None => {
                            return Err(ParserError::InvalidToken(format!(
                                "cover row outside .names: '{}'",
                                line
                            ))
                            .into());
                        }
                    }
                }
            }

            let mut builder = Builder {
                ntk: Ntk::with_name(model),
                defs,
                resolved: HashMap::new(),
                in_progress: HashSet::new(),
            };
            for name in &input_names {
                let input = builder.ntk.add_input(name)?;
                builder
                    .resolved
                    .insert(name.clone(), NtkEdge::new(input, false));
            }
            let names: Vec<String> = builder.defs.keys().cloned().collect();
            for name in names {
                builder.resolve(&name)?;
            }
            for name in output_names {
                let edge = builder.resolve(&name)?;
                builder.ntk.add_output(&name, edge)?;
            }

            builder.ntk.check_integrity()?;
            Ok(builder.ntk)
        }

        fn resolve(&mut self, name: &str) -> Result<NtkEdge> {
            if let Some(edge) = self.resolved.get(name) {
                return Ok(edge.clone());
            }
            if !self.defs.contains_key(name) {
                return Err(ParserError::UndefinedSignal(name.to_string()).into());
            }
            if !self.in_progress.insert(name.to_string()) {
                return Err(ParserError::InvalidToken(format!(
                    "combinational loop through '{}'",
                    name
                ))
                .into());
            }

            let (inputs, rows) = {
                let def = &self.defs[name];
                (def.inputs.clone(), def.rows.clone())
            };
            let mut fanins = Vec::with_capacity(inputs.len());
            for input in &inputs {
                fanins.push(self.resolve(input)?);
            }

            // An empty cover is constant 0.
            let mut products: Vec<NtkEdge> = Vec::with_capacity(rows.len());
            for row in &rows {
                products.push(self.product(name, row, &fanins)?);
            }
            let mut edge = self.ntk.const_edge();
            for (i, product) in products.into_iter().enumerate() {
                if i == 0 {
                    edge = product;
                } else {
                    edge = !self.ntk.new_and(None, !edge, !product)?;
                }
            }

            self.in_progress.remove(name);
            self.resolved.insert(name.to_string(), edge.clone());
            Ok(edge)
        }

        /// One cover row as an AND of literals.
        fn product(&mut self, name: &str, row: &str, fanins: &[NtkEdge]) -> Result<NtkEdge> {
            let tokens: Vec<&str> = row.split_whitespace().collect();
            let (mask, out) = match (tokens.len(), fanins.len()) {
                (1, 0) => ("", tokens[0]),
                (2, _) => (tokens[0], tokens[1]),
                _ => {
                    return Err(ParserError::InvalidToken(format!(
                        "malformed cover row '{}' for '{}'",
                        row, name
                    ))
                    .into());
                }
            };
            if out != "1" {
                return Err(ParserError::UnsupportedFeature(format!(
                    "off-set cover row for '{}'",
                    name
                ))
                .into());
            }
            if mask.len() != fanins.len() {
                return Err(ParserError::InvalidToken(format!(
                    "cover row '{}' does not match the {} inputs of '{}'",
                    row,
                    fanins.len(),
                    name
                ))
                .into());
            }
            let mut acc = !self.ntk.const_edge();
            for (bit, fanin) in mask.chars().zip(fanins.iter().cloned()) {
                acc = match bit {
                    '1' => self.ntk.new_and(None, acc, fanin)?,
                    '0' => self.ntk.new_and(None, acc, !fanin)?,
                    '-' => acc,
                    other => {
                        return Err(ParserError::InvalidToken(format!(
                            "bad cover literal '{}' for '{}'",
                            other, name
                        ))
                        .into());
                    }
                };
            }
            Ok(acc)
        }
    }
}

impl Ntk {
    /// Creates a netlist from an open BENCH stream.
    pub fn from_bench(reader: impl BufRead) -> Result<Self> {
        bench::Builder::parse(reader)
    }

    /// Creates a netlist from a `.bench` file.
    pub fn read_bench<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path.as_ref()).map_err(io_err)?;
        Self::from_bench(BufReader::new(f))
    }

    /// Creates a netlist from an open BLIF stream.
    pub fn from_blif(reader: impl BufRead) -> Result<Self> {
        blif::Builder::parse(reader)
    }

    /// Creates a netlist from a `.blif` file.
    pub fn read_blif<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path.as_ref()).map_err(io_err)?;
        Self::from_blif(BufReader::new(f))
    }

    /// Writes the netlist to an open stream in BLIF.
    pub fn to_blif(&self, w: &mut impl Write) -> Result<()> {
        let wr = |e: std::io::Error| crate::NtkError::from(io_err(e));

        writeln!(w, ".model {}", self.get_name()).map_err(wr)?;
        let input_names: Vec<String> = self
            .get_inputs()
            .iter()
            .map(|n| n.borrow().get_name().to_string())
            .collect();
        writeln!(w, ".inputs {}", input_names.join(" ")).map_err(wr)?;
        let output_names: Vec<String> = self
            .get_outputs()
            .iter()
            .map(|n| n.borrow().get_name().to_string())
            .collect();
        writeln!(w, ".outputs {}", output_names.join(" ")).map_err(wr)?;

        for node in self.topo_sort_pi_node()? {
            let node = node.borrow();
            let fanins = node.get_fanins();
            if node.is_and() {
                writeln!(
                    w,
                    ".names {} {} {}",
                    fanins[0].get_node().borrow().get_name(),
                    fanins[1].get_node().borrow().get_name(),
                    node.get_name()
                )
                .map_err(wr)?;
                let lit = |e: &NtkEdge| if e.get_complement() { '0' } else { '1' };
                writeln!(w, "{}{} 1", lit(&fanins[0]), lit(&fanins[1])).map_err(wr)?;
            } else if node.is_inv() {
                writeln!(
                    w,
                    ".names {} {}",
                    fanins[0].get_node().borrow().get_name(),
                    node.get_name()
                )
                .map_err(wr)?;
                let lit = if fanins[0].get_complement() { '1' } else { '0' };
                writeln!(w, "{} 1", lit).map_err(wr)?;
            }
        }

        for output in self.get_outputs() {
            let output = output.borrow();
            let fanins = output.get_fanins();
            let fanin = &fanins[0];
            let driver = fanin.get_node();
            let driver = driver.borrow();
            if driver.is_const() {
                writeln!(w, ".names {}", output.get_name()).map_err(wr)?;
                if fanin.get_complement() {
                    writeln!(w, "1").map_err(wr)?;
                }
            } else if driver.get_name() != output.get_name() || fanin.get_complement() {
                writeln!(w, ".names {} {}", driver.get_name(), output.get_name()).map_err(wr)?;
                writeln!(w, "{} 1", if fanin.get_complement() { '0' } else { '1' })
                    .map_err(wr)?;
            }
        }
        writeln!(w, ".end").map_err(wr)?;
        Ok(())
    }

    /// Writes the netlist to a `.blif` file.
    pub fn write_blif<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let f = File::create(path.as_ref()).map_err(io_err)?;
        self.to_blif(&mut BufWriter::new(f))
    }
}
