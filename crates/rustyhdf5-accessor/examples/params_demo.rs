//! Create a store, write a few parameters, reopen it and dump the tree.
//!
//! Usage: cargo run -p rustyhdf5-accessor --example params_demo [PATH]

use std::error::Error;
use std::path::PathBuf;

use ndarray::Array2;
use rustyhdf5_accessor::{OpenMode, Session, TypeClass};

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("params_demo.rh5"));

    let mut session = Session::default();

    // write
    session.create(&path)?;
    let table = Array2::from_shape_fn((4, 6), |(i, j)| (i * 6 + j) as f64 + 1.5);
    session.set("dset_double", &table)?;
    session.set_description(Some("4x6 demo table"))?;
    session.set("dset_string", "Hello, store!")?;
    if !session.create_group("params", true) {
        return Err("could not create group 'params'".into());
    }
    session.set("n", 23)?;
    session.set("x", 24.5)?;
    session.set_units(Some("m"))?;
    session.set("text", "hello")?;
    session.set("m", ndarray::array![[1.0, 2.0, 3.0], [11.0, 22.0, 33.0]])?;
    session.close()?;

    // dump
    session.open(&path, OpenMode::ReadOnly)?;
    println!("{}", path.display());
    for entry in session.walk()? {
        let indent = "  ".repeat(entry.path.matches('/').count() - 1);
        match &entry.dataset {
            None => println!("{indent}Group: {}", entry.path),
            Some(d) => {
                let class = match d.type_class {
                    TypeClass::Integer => "int",
                    TypeClass::Float => "float",
                    TypeClass::String => "string",
                    TypeClass::Other => "?",
                };
                println!("{indent}Dataset: {} {} ({class})", entry.path, d.shape);
            }
        }
    }

    // read back
    let table = session.get_matrix("dset_double")?;
    assert_eq!(table[[1, 2]], 9.5);
    assert_eq!(session.get_string("dset_string")?, "Hello, store!");
    if !session.descend("params") {
        return Err("group 'params' missing".into());
    }
    let m = session.get_matrix("m")?;
    println!(
        "n = {}, x = {} {}, text = {:?}, m[1][2] = {}",
        session.get_int("n")?,
        session.get_double("x")?,
        session.attribute("x", "units")?.unwrap_or_default(),
        session.get_string("text")?,
        m[[1, 2]],
    );
    session.close()?;

    println!("\nProgram ended");
    Ok(())
}
